use super::{ParseContext, Syntax};
use crate::error::TplError;
use crate::lexer::token::{Token, TokenKind};
use crate::node::{Directive, Echo, Node};
use crate::parser::assembler::Assembler;

struct EchoBuild {
    token: Token,
    escape: bool,
    expr: Option<String>,
}

struct DirectiveBuild {
    token: Token,
    name: String,
    body: Option<String>,
}

/// 动态文法的语法处理器：组装输出节点与指令节点。
/// 无指令体的指令（`@else` 等）在文法切换或流结束时收尾。
pub struct DynamicSyntax {
    echo: Option<EchoBuild>,
    directive: Option<DirectiveBuild>,
}

impl DynamicSyntax {
    pub fn new() -> Self {
        Self {
            echo: None,
            directive: None,
        }
    }

    fn flush_directive(&mut self, pctx: &ParseContext, asm: &mut Assembler) {
        if let Some(d) = self.directive.take() {
            asm.push(Node::Directive(Directive {
                context: pctx.node_context(&d.token),
                name: d.name.to_lowercase(),
                body: d.body,
            }));
        }
    }
}

impl Syntax for DynamicSyntax {
    fn handle(
        &mut self,
        pctx: &ParseContext,
        asm: &mut Assembler,
        token: &Token,
    ) -> Result<(), TplError> {
        match token.kind {
            TokenKind::DynOpen | TokenKind::DynOpenRaw => {
                self.flush_directive(pctx, asm);
                self.echo = Some(EchoBuild {
                    token: token.clone(),
                    escape: token.kind == TokenKind::DynOpen,
                    expr: None,
                });
            }

            TokenKind::DynBody => {
                if let Some(echo) = self.echo.as_mut() {
                    echo.expr = Some(token.content.trim().to_string());
                } else if let Some(d) = self.directive.as_mut() {
                    d.body = Some(token.content.trim().to_string());
                }
            }

            TokenKind::DynClose | TokenKind::DynCloseRaw => {
                let Some(echo) = self.echo.take() else {
                    return Err(pctx.syntax_error("意外的输出闭合", token));
                };
                let expr = echo.expr.unwrap_or_default();
                if expr.is_empty() {
                    return Err(pctx.syntax_error("输出表达式为空", &echo.token));
                }
                asm.push(Node::Echo(Echo {
                    context: pctx.node_context(&echo.token),
                    expr,
                    escape: echo.escape,
                }));
            }

            TokenKind::DynDirective => {
                self.flush_directive(pctx, asm);
                self.directive = Some(DirectiveBuild {
                    token: token.clone(),
                    name: String::new(),
                    body: None,
                });
            }

            TokenKind::DynKeyword => {
                if let Some(d) = self.directive.as_mut() {
                    d.name = token.content.clone();
                }
            }

            TokenKind::DynBodyOpen => {}

            TokenKind::DynBodyClose => {
                self.flush_directive(pctx, asm);
            }

            _ => return Err(pctx.syntax_error("意外的动态 token", token)),
        }
        Ok(())
    }

    fn flush(&mut self, pctx: &ParseContext, asm: &mut Assembler) -> Result<(), TplError> {
        self.flush_directive(pctx, asm);
        Ok(())
    }
}
