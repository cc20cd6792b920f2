pub mod cursor;
pub mod grammar;
pub mod token;

use crate::error::TplError;
use crate::loader::{Source, line_col};
use cursor::Cursor;
use grammar::Grammar;
use token::{Token, TokenKind};

/// 词法分析器：按注册顺序逐个尝试文法，先匹配者胜出。
///
/// 未被任何文法认领的字符落入内置的原始文本回退文法，
/// 因此顺序即优先级：动态指令文法必须先于标记文法注册，
/// 否则指令会被当作普通标签吞掉。
pub struct Lexer {
    grammars: Vec<Box<dyn Grammar>>,
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            grammars: Vec::new(),
        }
    }

    /// 默认文法组合：动态 → 内联 → 标记，原始文本兜底
    pub fn with_default_grammars() -> Self {
        let mut lexer = Self::new();
        lexer.add_grammar(Box::new(grammar::dynamic::DynamicGrammar::new()));
        lexer.add_grammar(Box::new(grammar::inline::InlineGrammar::new()));
        lexer.add_grammar(Box::new(grammar::html::HtmlGrammar::new()));
        lexer
    }

    pub fn add_grammar(&mut self, grammar: Box<dyn Grammar>) {
        self.grammars.push(grammar);
    }

    /// 将源码切分为 token 序列
    pub fn parse(&mut self, source: &Source) -> Result<Vec<Token>, TplError> {
        let mut cur = Cursor::new(&source.content);
        let mut tokens: Vec<Token> = Vec::new();
        let mut raw_start = 0usize;
        let mut raw_buf = String::new();

        'stream: while !cur.eof() {
            let mark = cur.mark();
            for grammar in self.grammars.iter_mut() {
                match grammar.try_parse(&mut cur) {
                    Some(matched) => {
                        if cur.mark() == mark {
                            // 文法声明匹配却未消费任何字符，立即失败而非死循环
                            let (line, col) = line_col(&source.content, cur.offset());
                            return Err(TplError::syntax(
                                &source.filename,
                                line,
                                col,
                                "未定义的 token",
                                &source.content,
                            ));
                        }
                        if !raw_buf.is_empty() {
                            tokens.push(Token::new(
                                TokenKind::Raw,
                                raw_start,
                                std::mem::take(&mut raw_buf),
                            ));
                        }
                        tokens.extend(matched);
                        continue 'stream;
                    }
                    None => cur.reset(mark),
                }
            }

            // 回退文法：逐字符收集为原始文本
            let (offset, c) = cur.next().expect("cursor not at eof");
            if raw_buf.is_empty() {
                raw_start = offset;
            }
            raw_buf.push(c);
        }

        if !raw_buf.is_empty() {
            tokens.push(Token::new(TokenKind::Raw, raw_start, raw_buf));
        }
        Ok(tokens)
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::with_default_grammars()
    }
}
