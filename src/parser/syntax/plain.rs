use super::{ParseContext, Syntax};
use crate::error::TplError;
use crate::lexer::token::Token;
use crate::node::{Node, Raw};
use crate::parser::assembler::Assembler;

/// 回退文法的语法处理器：原始文本直接入树
pub struct PlainSyntax;

impl PlainSyntax {
    pub fn new() -> Self {
        Self
    }
}

impl Syntax for PlainSyntax {
    fn handle(
        &mut self,
        pctx: &ParseContext,
        asm: &mut Assembler,
        token: &Token,
    ) -> Result<(), TplError> {
        asm.push(Node::Raw(Raw {
            context: pctx.node_context(token),
            text: token.content.clone(),
        }));
        Ok(())
    }
}
