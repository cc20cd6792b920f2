use super::Grammar;
use super::is_keyword_char;
use crate::lexer::cursor::Cursor;
use crate::lexer::token::{Token, TokenKind};

/// 动态文法：`{{ expr }}` 转义输出、`{!! expr !!}` 原样输出、
/// `@directive(body)` 控制指令。`@@` 与 `@{{` 为转义序列。
///
/// 未注册的 `@keyword` 序列不视为指令（邮箱地址、CSS `@media`
/// 等按原始文本处理）。
pub struct DynamicGrammar {
    directives: Vec<&'static str>,
}

impl DynamicGrammar {
    pub fn new() -> Self {
        Self {
            directives: vec!["if", "elseif", "else", "endif", "for", "endfor"],
        }
    }

    fn parse_at(&self, cur: &mut Cursor) -> Option<Vec<Token>> {
        let at_offset = cur.offset();

        // @@ → 字面 '@'
        if cur.lookahead(1) == Some('@') {
            cur.next();
            let (offset, _) = cur.next()?;
            return Some(vec![Token::new(TokenKind::Raw, offset, "@")]);
        }

        // @{{ → 字面 '{{'：吞掉 '@'，保留首个 '{'，余下的流不再构成输出块
        if cur.starts_with("@{{") || cur.starts_with("@{!!") {
            cur.next();
            let (offset, c) = cur.next()?;
            return Some(vec![Token::new(TokenKind::Raw, offset, c.to_string())]);
        }

        cur.next();

        let mut name = String::new();
        let name_offset = cur.offset();
        while let Some(c) = cur.peek() {
            if is_keyword_char(c) {
                name.push(c);
                cur.next();
            } else {
                break;
            }
        }
        let lowered = name.to_lowercase();
        if name.is_empty() || !self.directives.iter().any(|d| *d == lowered) {
            return None;
        }

        let mut tokens = vec![
            Token::new(TokenKind::DynDirective, at_offset, "@"),
            Token::new(TokenKind::DynKeyword, name_offset, name),
        ];

        if cur.peek() == Some('(') {
            let (open_offset, _) = cur.next()?;
            tokens.push(Token::new(TokenKind::DynBodyOpen, open_offset, "("));

            let body_offset = cur.offset();
            let mut body = String::new();
            let mut depth = 1usize;
            loop {
                let (offset, c) = cur.next()?;
                match c {
                    '"' | '\'' => {
                        // 字符串内的括号不参与配平
                        body.push(c);
                        loop {
                            let (_, c2) = cur.next()?;
                            body.push(c2);
                            if c2 == c {
                                break;
                            }
                        }
                    }
                    '(' => {
                        depth += 1;
                        body.push(c);
                    }
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            if !body.is_empty() {
                                tokens.push(Token::new(TokenKind::DynBody, body_offset, body));
                            }
                            tokens.push(Token::new(TokenKind::DynBodyClose, offset, ")"));
                            break;
                        }
                        body.push(c);
                    }
                    _ => body.push(c),
                }
            }
        }

        Some(tokens)
    }

    fn parse_braces(&self, cur: &mut Cursor) -> Option<Vec<Token>> {
        let (end, open_kind, close_kind) = if cur.starts_with("{{") {
            ("}}", TokenKind::DynOpen, TokenKind::DynClose)
        } else if cur.starts_with("{!!") {
            ("!!}", TokenKind::DynOpenRaw, TokenKind::DynCloseRaw)
        } else {
            return None;
        };
        let start = if open_kind == TokenKind::DynOpen { "{{" } else { "{!!" };

        let open_offset = cur.offset();
        cur.consume(start);
        let mut tokens = vec![Token::new(open_kind, open_offset, start)];

        let body_offset = cur.offset();
        let mut body = String::new();
        while !cur.starts_with(end) {
            let (_, c) = cur.next()?;
            body.push(c);
        }
        if !body.is_empty() {
            tokens.push(Token::new(TokenKind::DynBody, body_offset, body));
        }

        let close_offset = cur.offset();
        cur.consume(end);
        tokens.push(Token::new(close_kind, close_offset, end));
        Some(tokens)
    }
}

impl Grammar for DynamicGrammar {
    fn try_parse(&mut self, cur: &mut Cursor) -> Option<Vec<Token>> {
        match cur.peek() {
            Some('@') => self.parse_at(cur),
            Some('{') => self.parse_braces(cur),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<Vec<Token>> {
        let mut cur = Cursor::new(input);
        DynamicGrammar::new().try_parse(&mut cur)
    }

    #[test]
    fn echo_body() {
        let tokens = parse("{{ user.name }}").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::DynOpen);
        assert_eq!(tokens[1].content, " user.name ");
        assert_eq!(tokens[2].kind, TokenKind::DynClose);
    }

    #[test]
    fn raw_echo_body() {
        let tokens = parse("{!! html !!}").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::DynOpenRaw);
        assert_eq!(tokens[2].kind, TokenKind::DynCloseRaw);
    }

    #[test]
    fn directive_with_body() {
        let tokens = parse("@if(a == \"x)\")").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::DynDirective,
                TokenKind::DynKeyword,
                TokenKind::DynBodyOpen,
                TokenKind::DynBody,
                TokenKind::DynBodyClose,
            ]
        );
        // 引号内的 ')' 不结束指令体
        assert_eq!(tokens[3].content, "a == \"x)\"");
    }

    #[test]
    fn bare_directive() {
        let tokens = parse("@else").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].content, "else");
    }

    #[test]
    fn unknown_keyword_rejected() {
        assert!(parse("@media(x)").is_none());
        assert!(parse("user@example.com".trim_start_matches("user")).is_none());
    }

    #[test]
    fn nested_parens_balanced() {
        let tokens = parse("@for(x in take(items, 3))").unwrap();
        let body = tokens.iter().find(|t| t.kind == TokenKind::DynBody).unwrap();
        assert_eq!(body.content, "x in take(items, 3)");
    }
}
