use super::Grammar;
use super::is_keyword_char;
use crate::lexer::cursor::Cursor;
use crate::lexer::token::{Token, TokenKind};

/// 内联注入文法：`${name}` 与 `${name|default}`。
/// 与标记文法配合，用于块注入点与属性值中的默认值回退。
pub struct InlineGrammar;

impl InlineGrammar {
    pub fn new() -> Self {
        Self
    }
}

impl Grammar for InlineGrammar {
    fn try_parse(&mut self, cur: &mut Cursor) -> Option<Vec<Token>> {
        if cur.peek() != Some('$') || cur.lookahead(1) != Some('{') {
            return None;
        }

        let open_offset = cur.offset();
        cur.consume("${");
        let mut tokens = vec![Token::new(TokenKind::InlineOpen, open_offset, "${")];

        let mut name: Option<(usize, String)> = None;
        let mut default: Option<(usize, String)> = None;
        let mut in_default = false;

        loop {
            let (offset, c) = cur.next()?;
            match c {
                '}' => {
                    flush_name(&mut tokens, &mut name);
                    // 分隔符后默认值为空视为无效注入点
                    if in_default {
                        let (_, buf) = default.take()?;
                        let trimmed = buf.trim();
                        if trimmed.is_empty() {
                            return None;
                        }
                        let def_offset = tokens.last().map(|t| t.offset).unwrap_or(offset);
                        tokens.push(Token::new(
                            TokenKind::InlineDefault,
                            def_offset,
                            trimmed.to_string(),
                        ));
                    }
                    tokens.push(Token::new(TokenKind::InlineClose, offset, "}"));
                    break;
                }
                '|' if !in_default => {
                    flush_name(&mut tokens, &mut name);
                    tokens.push(Token::new(TokenKind::InlineSeparator, offset, "|"));
                    in_default = true;
                    default = Some((offset, String::new()));
                }
                '"' | '\'' if in_default => {
                    let (_, buf) = default.as_mut()?;
                    buf.push(c);
                    loop {
                        let (_, c2) = cur.next()?;
                        buf.push(c2);
                        if c2 == c {
                            break;
                        }
                    }
                }
                c if in_default => {
                    default.as_mut()?.1.push(c);
                }
                c if c.is_whitespace() => continue,
                c if is_keyword_char(c) => match &mut name {
                    Some((_, buf)) => buf.push(c),
                    None => name = Some((offset, c.to_string())),
                },
                _ => return None,
            }
        }

        // 注入点必须有名称
        if !tokens.iter().any(|t| t.kind == TokenKind::InlineName) {
            return None;
        }
        Some(tokens)
    }
}

fn flush_name(tokens: &mut Vec<Token>, name: &mut Option<(usize, String)>) {
    if let Some((offset, buf)) = name.take() {
        tokens.push(Token::new(TokenKind::InlineName, offset, buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<Vec<Token>> {
        let mut cur = Cursor::new(input);
        InlineGrammar::new().try_parse(&mut cur)
    }

    #[test]
    fn name_only() {
        let tokens = parse("${title}").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::InlineOpen,
                TokenKind::InlineName,
                TokenKind::InlineClose,
            ]
        );
    }

    #[test]
    fn name_with_default() {
        let tokens = parse("${name|Guest}").unwrap();
        let default = tokens
            .iter()
            .find(|t| t.kind == TokenKind::InlineDefault)
            .unwrap();
        assert_eq!(default.content, "Guest");
    }

    #[test]
    fn default_keeps_spaces() {
        let tokens = parse("${name|Dear Guest}").unwrap();
        let default = tokens
            .iter()
            .find(|t| t.kind == TokenKind::InlineDefault)
            .unwrap();
        assert_eq!(default.content, "Dear Guest");
    }

    #[test]
    fn empty_default_rejected() {
        assert!(parse("${name|}").is_none());
    }

    #[test]
    fn missing_name_rejected() {
        assert!(parse("${}").is_none());
        assert!(parse("${ | x}").is_none());
    }

    #[test]
    fn unterminated_rejected() {
        assert!(parse("${name").is_none());
    }
}
