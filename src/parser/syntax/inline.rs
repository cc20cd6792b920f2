use super::{ParseContext, Syntax, strip_quotes};
use crate::error::TplError;
use crate::lexer::token::{Token, TokenKind};
use crate::node::{Inline, Node};
use crate::parser::assembler::Assembler;

struct InlineBuild {
    token: Token,
    name: String,
    default: Option<String>,
}

/// 内联注入文法的语法处理器
pub struct InlineSyntax {
    pending: Option<InlineBuild>,
}

impl InlineSyntax {
    pub fn new() -> Self {
        Self { pending: None }
    }
}

impl Syntax for InlineSyntax {
    fn handle(
        &mut self,
        pctx: &ParseContext,
        asm: &mut Assembler,
        token: &Token,
    ) -> Result<(), TplError> {
        match token.kind {
            TokenKind::InlineOpen => {
                self.pending = Some(InlineBuild {
                    token: token.clone(),
                    name: String::new(),
                    default: None,
                });
            }
            TokenKind::InlineName => {
                if let Some(p) = self.pending.as_mut() {
                    p.name = token.content.clone();
                }
            }
            TokenKind::InlineSeparator => {}
            TokenKind::InlineDefault => {
                if let Some(p) = self.pending.as_mut() {
                    p.default = Some(strip_quotes(&token.content).to_string());
                }
            }
            TokenKind::InlineClose => {
                let Some(p) = self.pending.take() else {
                    return Err(pctx.syntax_error("意外的注入闭合", token));
                };
                asm.push(Node::Inline(Inline {
                    context: pctx.node_context(&p.token),
                    name: p.name,
                    default: p.default,
                }));
            }
            _ => return Err(pctx.syntax_error("意外的注入 token", token)),
        }
        Ok(())
    }
}
