pub mod dynamic;
pub mod html;
pub mod inline;
pub mod plain;

use super::assembler::Assembler;
use crate::error::TplError;
use crate::lexer::token::Token;
use crate::loader::{Source, line_col};
use crate::node::Context;

/// 一次解析调用的共享上下文：源码（错误摘录用）与模板路径
pub struct ParseContext<'a> {
    pub source: &'a Source,
    pub path: Option<&'a str>,
}

impl ParseContext<'_> {
    pub fn node_context(&self, token: &Token) -> Context {
        Context::new(token, self.path)
    }

    pub fn syntax_error(&self, message: impl Into<String>, token: &Token) -> TplError {
        let (line, col) = line_col(&self.source.content, token.offset);
        TplError::syntax(&self.source.filename, line, col, message, &self.source.content)
    }
}

/// 语法处理器：每个文法一个，把该文法的 token 变成 AST 变更。
/// 处理器可以跨 token 持有装配状态，文法切换与流结束时通过
/// [`Syntax::flush`] 收尾。
pub trait Syntax {
    fn handle(
        &mut self,
        pctx: &ParseContext,
        asm: &mut Assembler,
        token: &Token,
    ) -> Result<(), TplError>;

    fn flush(&mut self, pctx: &ParseContext, asm: &mut Assembler) -> Result<(), TplError> {
        let _ = (pctx, asm);
        Ok(())
    }
}

/// 去掉成对的外层引号（注入默认值等场景）
pub(crate) fn strip_quotes(s: &str) -> &str {
    let b = s.as_bytes();
    if b.len() >= 2 && (b[0] == b'"' || b[0] == b'\'') && b[b.len() - 1] == b[0] {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
