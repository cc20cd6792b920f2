use super::Grammar;
use super::is_keyword_char;
use crate::lexer::cursor::Cursor;
use crate::lexer::token::{Token, TokenKind};

/// 标记文法：切出 `<tag attr="value">`、`</tag>`、`<tag/>` 结构。
/// 任何不构成合法标签的 `<` 序列整体拒绝，交由回退文法按原文输出。
pub struct HtmlGrammar;

impl HtmlGrammar {
    pub fn new() -> Self {
        Self
    }
}

impl Grammar for HtmlGrammar {
    fn try_parse(&mut self, cur: &mut Cursor) -> Option<Vec<Token>> {
        if cur.peek() != Some('<') {
            return None;
        }

        let mut tokens = Vec::new();
        let open_offset = cur.offset();
        cur.next();

        if cur.peek() == Some('/') {
            cur.next();
            tokens.push(Token::new(TokenKind::HtmlOpenShort, open_offset, "</"));
        } else {
            tokens.push(Token::new(TokenKind::HtmlOpen, open_offset, "<"));
        }

        let mut keyword: Option<(usize, String)> = None;
        let mut whitespace: Option<(usize, String)> = None;

        while let Some((offset, c)) = cur.next() {
            match c {
                '"' | '\'' | '`' => {
                    flush_keyword(&mut tokens, &mut keyword);
                    flush_whitespace(&mut tokens, &mut whitespace);

                    // 引号内为属性值，收集到配对引号为止；流结束即未闭合，整体拒绝
                    let mut attr = String::from(c);
                    loop {
                        let (_, c2) = cur.next()?;
                        attr.push(c2);
                        if c2 == c {
                            break;
                        }
                    }
                    tokens.push(Token::new(TokenKind::HtmlAttribute, offset, attr));
                }
                '=' => {
                    flush_keyword(&mut tokens, &mut keyword);
                    flush_whitespace(&mut tokens, &mut whitespace);
                    tokens.push(Token::new(TokenKind::HtmlEqual, offset, "="));
                }
                '/' => {
                    if cur.peek() == Some('>') {
                        flush_keyword(&mut tokens, &mut keyword);
                        flush_whitespace(&mut tokens, &mut whitespace);
                        cur.next();
                        tokens.push(Token::new(TokenKind::HtmlCloseShort, offset, "/>"));
                        return validate(tokens);
                    }
                    return None;
                }
                '>' => {
                    flush_keyword(&mut tokens, &mut keyword);
                    flush_whitespace(&mut tokens, &mut whitespace);
                    tokens.push(Token::new(TokenKind::HtmlClose, offset, ">"));
                    return validate(tokens);
                }
                c if c.is_whitespace() => {
                    flush_keyword(&mut tokens, &mut keyword);
                    match &mut whitespace {
                        Some((_, buf)) => buf.push(c),
                        None => whitespace = Some((offset, c.to_string())),
                    }
                }
                c if is_keyword_char(c) => {
                    flush_whitespace(&mut tokens, &mut whitespace);
                    match &mut keyword {
                        Some((_, buf)) => buf.push(c),
                        None => keyword = Some((offset, c.to_string())),
                    }
                }
                _ => return None,
            }
        }

        // 流结束仍未遇到 '>'
        None
    }
}

fn flush_keyword(tokens: &mut Vec<Token>, keyword: &mut Option<(usize, String)>) {
    if let Some((offset, buf)) = keyword.take() {
        tokens.push(Token::new(TokenKind::HtmlKeyword, offset, buf));
    }
}

fn flush_whitespace(tokens: &mut Vec<Token>, whitespace: &mut Option<(usize, String)>) {
    if let Some((offset, buf)) = whitespace.take() {
        tokens.push(Token::new(TokenKind::HtmlWhitespace, offset, buf));
    }
}

/// 标签结构校验：必须以标签名关键字开头，等号与属性值不得先于标签名出现
fn validate(tokens: Vec<Token>) -> Option<Vec<Token>> {
    if tokens.len() < 3 {
        return None;
    }
    for token in &tokens[1..] {
        match token.kind {
            TokenKind::HtmlWhitespace => continue,
            TokenKind::HtmlAttribute | TokenKind::HtmlEqual => return None,
            TokenKind::HtmlKeyword => return Some(tokens),
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<Vec<Token>> {
        let mut cur = Cursor::new(input);
        HtmlGrammar::new().try_parse(&mut cur)
    }

    #[test]
    fn simple_tag() {
        let tokens = parse("<div>").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::HtmlOpen);
        assert_eq!(tokens[1].kind, TokenKind::HtmlKeyword);
        assert_eq!(tokens[1].content, "div");
        assert_eq!(tokens[2].kind, TokenKind::HtmlClose);
    }

    #[test]
    fn closing_tag() {
        let tokens = parse("</div>").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::HtmlOpenShort);
    }

    #[test]
    fn self_closing_with_attr() {
        let tokens = parse("<img src=\"a.png\"/>").unwrap();
        let kinds: Vec<_> = tokens
            .iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::HtmlWhitespace)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::HtmlOpen,
                TokenKind::HtmlKeyword,
                TokenKind::HtmlKeyword,
                TokenKind::HtmlEqual,
                TokenKind::HtmlAttribute,
                TokenKind::HtmlCloseShort,
            ]
        );
        assert_eq!(tokens.last().unwrap().kind, TokenKind::HtmlCloseShort);
    }

    #[test]
    fn attribute_keeps_quotes() {
        let tokens = parse("<a href='x'>").unwrap();
        let attr = tokens
            .iter()
            .find(|t| t.kind == TokenKind::HtmlAttribute)
            .unwrap();
        assert_eq!(attr.content, "'x'");
    }

    #[test]
    fn comparison_is_not_a_tag() {
        // "a < b" 不是标签，整体拒绝
        assert!(parse("< b)").is_none());
    }

    #[test]
    fn unterminated_tag_rejected() {
        assert!(parse("<div class=\"x\"").is_none());
    }

    #[test]
    fn namespaced_name_allowed() {
        let tokens = parse("<block:title>").unwrap();
        assert_eq!(tokens[1].content, "block:title");
    }
}
