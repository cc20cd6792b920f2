use crate::compiler::result::CompileResult;
use crate::compiler::{CompileFailure, Compiler, Renderer, escape_text};
use crate::node::Node;

/// 核心渲染器：模板容器、命名块与原始文本
pub struct CoreRenderer;

impl Renderer for CoreRenderer {
    fn render(
        &self,
        compiler: &Compiler,
        res: &mut CompileResult,
        node: &Node,
    ) -> Result<bool, CompileFailure> {
        match node {
            Node::Template(t) => {
                if let Some(path) = &t.path {
                    res.add_path(path);
                }
                // 携带上下文的 Template 是引入拼接点：
                // 进入后生成行的位置链多出一跳宿主模板
                let spliced = t.context.as_ref().is_some_and(|c| c.path.is_some());
                if spliced {
                    res.enter_splice(t.context.as_ref().expect("checked above"));
                }
                let rendered = compiler.compile_nodes(res, &t.children);
                if spliced {
                    res.exit_splice();
                }
                rendered?;
                // 游离块收集备用，不内联渲染
                Ok(true)
            }
            Node::Block(b) => {
                compiler.compile_nodes(res, &b.children)?;
                Ok(true)
            }
            Node::Raw(r) => {
                res.push_line(&format!("T {}", escape_text(&r.text)), Some(&r.context));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
