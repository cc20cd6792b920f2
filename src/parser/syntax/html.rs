use super::{ParseContext, Syntax};
use crate::error::TplError;
use crate::lexer::token::{Token, TokenKind};
use crate::node::{Attr, Node, Raw, Tag};
use crate::parser::assembler::Assembler;

/// 自闭合 void 元素
const VOID_ELEMENTS: &[&str] = &[
    "meta", "link", "input", "br", "hr", "img", "source", "area", "base", "col", "embed", "track",
    "wbr", "param",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// 属性装配状态
enum AttrState {
    /// 无挂起属性
    Idle,
    /// 属性名已出现，值未定（可能是布尔属性）
    Named,
    /// 已见 `=`，等待属性值
    ExpectValue,
}

struct TagBuild {
    tag: Tag,
    open_kind: TokenKind,
    attr: AttrState,
}

/// 标记文法的语法处理器：跨 token 组装标签与属性
pub struct HtmlSyntax {
    building: Option<TagBuild>,
}

impl HtmlSyntax {
    pub fn new() -> Self {
        Self { building: None }
    }
}

impl Syntax for HtmlSyntax {
    fn handle(
        &mut self,
        pctx: &ParseContext,
        asm: &mut Assembler,
        token: &Token,
    ) -> Result<(), TplError> {
        match token.kind {
            TokenKind::HtmlOpen | TokenKind::HtmlOpenShort => {
                self.building = Some(TagBuild {
                    tag: Tag::new("", pctx.node_context(token)),
                    open_kind: token.kind,
                    attr: AttrState::Idle,
                });
            }

            TokenKind::HtmlKeyword => {
                let Some(b) = self.building.as_mut() else {
                    return Err(pctx.syntax_error("意外的标记 token", token));
                };
                if b.tag.name.is_empty() {
                    b.tag.name = token.content.clone();
                    return Ok(());
                }
                match b.attr {
                    AttrState::ExpectValue => {
                        // 无引号属性值
                        let value = Node::Raw(Raw {
                            context: pctx.node_context(token),
                            text: token.content.clone(),
                        });
                        if let Some(Node::Attr(attr)) = b.tag.attrs.last_mut() {
                            attr.value.push(value);
                        }
                        b.attr = AttrState::Idle;
                    }
                    _ => {
                        b.tag.attrs.push(Node::Attr(Attr {
                            context: pctx.node_context(token),
                            name: token.content.clone(),
                            value: Vec::new(),
                        }));
                        b.attr = AttrState::Named;
                    }
                }
            }

            TokenKind::HtmlEqual => {
                let Some(b) = self.building.as_mut() else {
                    return Err(pctx.syntax_error("意外的属性 token", token));
                };
                match b.attr {
                    AttrState::Named => b.attr = AttrState::ExpectValue,
                    _ => return Err(pctx.syntax_error("意外的属性 token", token)),
                }
            }

            TokenKind::HtmlAttribute => {
                let Some(b) = self.building.as_mut() else {
                    return Err(pctx.syntax_error("意外的属性 token", token));
                };
                if matches!(b.attr, AttrState::Idle) {
                    return Err(pctx.syntax_error("意外的属性 token", token));
                }
                // 去引号后作为片段再解析，属性值内允许输出块与注入点
                let inner = &token.content[1..token.content.len().saturating_sub(1)];
                let value = crate::parser::parse_fragment(pctx, inner, token.offset + 1)?;
                if let Some(Node::Attr(attr)) = b.tag.attrs.last_mut() {
                    attr.value = value;
                }
                b.attr = AttrState::Idle;
            }

            TokenKind::HtmlCloseShort => {
                let Some(mut b) = self.building.take() else {
                    return Err(pctx.syntax_error("意外的标记 token", token));
                };
                b.tag.void = true;
                b.tag.self_closing = true;
                asm.push(Node::Tag(b.tag));
            }

            TokenKind::HtmlClose => {
                let Some(b) = self.building.take() else {
                    return Err(pctx.syntax_error("意外的标记 token", token));
                };
                if b.open_kind == TokenKind::HtmlOpenShort {
                    // </name>：必须与当前打开的标签配对
                    asm.close(&b.tag.name)
                        .map_err(|msg| pctx.syntax_error(msg, &b.tag.context.token))?;
                } else if is_void_element(&b.tag.name) {
                    let mut tag = b.tag;
                    tag.void = true;
                    asm.push(Node::Tag(tag));
                } else {
                    asm.open(Node::Tag(b.tag));
                }
            }

            TokenKind::HtmlWhitespace => {}

            _ => return Err(pctx.syntax_error("意外的标记 token", token)),
        }
        Ok(())
    }
}
