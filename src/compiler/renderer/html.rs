use crate::compiler::result::CompileResult;
use crate::compiler::{CompileFailure, Compiler, Renderer, escape_text};
use crate::node::Node;

/// 标记渲染器：标签与属性重建为字面文本指令
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(
        &self,
        compiler: &Compiler,
        res: &mut CompileResult,
        node: &Node,
    ) -> Result<bool, CompileFailure> {
        match node {
            Node::Tag(t) => {
                res.push_line(
                    &format!("T {}", escape_text(&format!("<{}", t.name))),
                    Some(&t.context),
                );
                compiler.compile_nodes(res, &t.attrs)?;

                if t.self_closing {
                    res.push_line("T />", Some(&t.context));
                } else {
                    res.push_line("T >", Some(&t.context));
                    if !t.void {
                        compiler.compile_nodes(res, &t.children)?;
                        res.push_line(
                            &format!("T {}", escape_text(&format!("</{}>", t.name))),
                            Some(&t.context),
                        );
                    }
                }
                Ok(true)
            }
            Node::Attr(a) => {
                res.push_line(
                    &format!("T {}", escape_text(&format!(" {}", a.name))),
                    Some(&a.context),
                );
                if !a.value.is_empty() {
                    res.push_line("T =\"", Some(&a.context));
                    compiler.compile_nodes(res, &a.value)?;
                    res.push_line("T \"", Some(&a.context));
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
