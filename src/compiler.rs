pub mod renderer;
pub mod result;

use crate::node::{Context, Node};
use result::CompileResult;

/// 编译期失败：错误信息 + 出错节点的上下文。
/// 行列与源码摘录由 Builder 在边界处解析补全。
#[derive(Debug)]
pub struct CompileFailure {
    pub message: String,
    pub context: Option<Context>,
}

impl CompileFailure {
    pub fn new(message: impl Into<String>, context: Option<&Context>) -> Self {
        Self {
            message: message.into(),
            context: context.cloned(),
        }
    }
}

/// 渲染器：认领并输出一种节点变体的代码生成策略
pub trait Renderer {
    /// 认领该节点时输出并返回 true，否则返回 false 交给下一个
    fn render(
        &self,
        compiler: &Compiler,
        res: &mut CompileResult,
        node: &Node,
    ) -> Result<bool, CompileFailure>;
}

/// 编译器：按注册顺序线性扫描渲染器，先认领者胜出。
/// 无人认领是配置错误，立即失败，绝不静默跳过。
pub struct Compiler {
    renderers: Vec<Box<dyn Renderer>>,
}

impl Compiler {
    /// 默认渲染器组合：核心 → 标记 → 动态
    pub fn new() -> Self {
        let mut compiler = Self::empty();
        compiler.add_renderer(Box::new(renderer::core::CoreRenderer));
        compiler.add_renderer(Box::new(renderer::html::HtmlRenderer));
        compiler.add_renderer(Box::new(renderer::dynamic::DynamicRenderer));
        compiler
    }

    pub fn empty() -> Self {
        Self {
            renderers: Vec::new(),
        }
    }

    pub fn add_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderers.push(renderer);
    }

    pub fn compile_node(&self, res: &mut CompileResult, node: &Node) -> Result<(), CompileFailure> {
        for renderer in &self.renderers {
            if renderer.render(self, res, node)? {
                return Ok(());
            }
        }
        Err(CompileFailure::new(
            "没有匹配的渲染器",
            node.context(),
        ))
    }

    pub fn compile_nodes(
        &self,
        res: &mut CompileResult,
        nodes: &[Node],
    ) -> Result<(), CompileFailure> {
        for node in nodes {
            self.compile_node(res, node)?;
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// 指令行内文本转义：渲染程序一行一条指令，
/// 字面文本中的换行与反斜杠需要编码
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::{Token, TokenKind};
    use crate::node::{Context, Raw};

    #[test]
    fn text_escape_roundtrip() {
        let cases = ["plain", "line1\nline2", "back\\slash", "\r\n", "尾\\"];
        for case in cases {
            let escaped = escape_text(case);
            assert!(!escaped.contains('\n'));
            assert_eq!(unescape_text(&escaped), case);
        }
    }

    fn raw_node(text: &str) -> Node {
        Node::Raw(Raw {
            context: Context {
                token: Token::new(TokenKind::Raw, 0, text),
                path: Some("t".to_string()),
            },
            text: text.to_string(),
        })
    }

    #[test]
    fn missing_renderer_is_fatal() {
        let compiler = Compiler::empty();
        let mut res = result::CompileResult::new();
        let err = compiler.compile_node(&mut res, &raw_node("x")).unwrap_err();
        assert!(err.message.contains("没有匹配的渲染器"));
        assert!(err.context.is_some());
    }

    /// 先注册者先认领
    struct Override;
    impl Renderer for Override {
        fn render(
            &self,
            _compiler: &Compiler,
            res: &mut result::CompileResult,
            node: &Node,
        ) -> Result<bool, CompileFailure> {
            if let Node::Raw(raw) = node {
                res.push_line(&format!("T [{}]", raw.text), Some(&raw.context));
                return Ok(true);
            }
            Ok(false)
        }
    }

    #[test]
    fn first_matching_renderer_wins() {
        let mut compiler = Compiler::empty();
        compiler.add_renderer(Box::new(Override));
        compiler.add_renderer(Box::new(renderer::core::CoreRenderer));

        let mut res = result::CompileResult::new();
        compiler.compile_node(&mut res, &raw_node("x")).unwrap();
        assert_eq!(res.content, "T [x]\n");
    }
}
