pub mod assembler;
pub mod syntax;

use crate::error::TplError;
use crate::lexer::Lexer;
use crate::lexer::grammar::Grammar;
use crate::lexer::token::{GrammarId, Token};
use crate::loader::Source;
use crate::node::{Node, Template};
use assembler::Assembler;
use syntax::{ParseContext, Syntax};

pub type GrammarFactory = fn() -> Box<dyn Grammar>;
pub type SyntaxFactory = fn() -> Box<dyn Syntax>;

/// 文法 + 语法处理器的注册项。顺序即词法优先级。
#[derive(Clone, Copy)]
pub struct SyntaxPair {
    pub id: GrammarId,
    /// None 表示词法器内置的回退文法
    pub grammar: Option<GrammarFactory>,
    pub syntax: SyntaxFactory,
}

/// 语法分析器：对每个 token 按其文法分派语法处理器，
/// 经装配器构建节点树。
///
/// 解析是纯操作：`with_path` 返回绑定路径的克隆，
/// 不同路径上的并发解析互不干扰。
#[derive(Clone)]
pub struct Parser {
    path: Option<String>,
    pairs: Vec<SyntaxPair>,
}

impl Parser {
    /// 默认注册组合：动态 → 内联 → 标记 → 原始文本兜底
    pub fn new() -> Self {
        Self {
            path: None,
            pairs: vec![
                SyntaxPair {
                    id: GrammarId::Dynamic,
                    grammar: Some(|| Box::new(crate::lexer::grammar::dynamic::DynamicGrammar::new())),
                    syntax: || Box::new(syntax::dynamic::DynamicSyntax::new()),
                },
                SyntaxPair {
                    id: GrammarId::Inline,
                    grammar: Some(|| Box::new(crate::lexer::grammar::inline::InlineGrammar::new())),
                    syntax: || Box::new(syntax::inline::InlineSyntax::new()),
                },
                SyntaxPair {
                    id: GrammarId::Html,
                    grammar: Some(|| Box::new(crate::lexer::grammar::html::HtmlGrammar::new())),
                    syntax: || Box::new(syntax::html::HtmlSyntax::new()),
                },
                SyntaxPair {
                    id: GrammarId::Raw,
                    grammar: None,
                    syntax: || Box::new(syntax::plain::PlainSyntax::new()),
                },
            ],
        }
    }

    /// 自定义注册组合（顺序承载优先级语义）
    pub fn with_pairs(pairs: Vec<SyntaxPair>) -> Self {
        Self { path: None, pairs }
    }

    /// 绑定模板路径的克隆，共享实例不受影响
    pub fn with_path(&self, path: &str) -> Self {
        let mut clone = self.clone();
        clone.path = Some(path.to_string());
        clone
    }

    /// 解析完整源码为模板根节点
    pub fn parse(&self, source: &Source) -> Result<Node, TplError> {
        let mut lexer = Lexer::new();
        for pair in &self.pairs {
            if let Some(factory) = pair.grammar {
                lexer.add_grammar(factory());
            }
        }
        let tokens = lexer.parse(source)?;

        let pctx = ParseContext {
            source,
            path: self.path.as_deref(),
        };
        let mut handlers: Vec<(GrammarId, Box<dyn Syntax>)> = self
            .pairs
            .iter()
            .map(|p| (p.id, (p.syntax)()))
            .collect();

        let mut asm = Assembler::new(Node::Template(Template::new(self.path.as_deref())));
        run_tokens(&pctx, &mut asm, &tokens, &mut handlers)?;

        asm.finish().map_err(|(message, token)| match token {
            Some(t) => pctx.syntax_error(message, &t),
            None => TplError::syntax(&source.filename, 1, 1, message, &source.content),
        })
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn run_tokens(
    pctx: &ParseContext,
    asm: &mut Assembler,
    tokens: &[Token],
    handlers: &mut [(GrammarId, Box<dyn Syntax>)],
) -> Result<(), TplError> {
    let mut last: Option<GrammarId> = None;
    for token in tokens {
        let gid = token.grammar();
        // 文法切换时给上一个处理器收尾的机会（悬挂的无体指令等）
        if let Some(prev) = last
            && prev != gid
            && let Some((_, handler)) = handlers.iter_mut().find(|(id, _)| *id == prev)
        {
            handler.flush(pctx, asm)?;
        }
        let Some((_, handler)) = handlers.iter_mut().find(|(id, _)| *id == gid) else {
            return Err(pctx.syntax_error("未定义的 token", token));
        };
        handler.handle(pctx, asm, token)?;
        last = Some(gid);
    }
    for (_, handler) in handlers.iter_mut() {
        handler.flush(pctx, asm)?;
    }
    Ok(())
}

/// 解析嵌入片段（带引号的属性值内容等）：
/// 只启用动态与内联文法，偏移校正回原始源码
pub(crate) fn parse_fragment(
    pctx: &ParseContext,
    text: &str,
    base_offset: usize,
) -> Result<Vec<Node>, TplError> {
    let mut lexer = Lexer::new();
    lexer.add_grammar(Box::new(crate::lexer::grammar::dynamic::DynamicGrammar::new()));
    lexer.add_grammar(Box::new(crate::lexer::grammar::inline::InlineGrammar::new()));

    let fragment = Source {
        content: text.to_string(),
        filename: pctx.source.filename.clone(),
    };
    let mut tokens = lexer.parse(&fragment)?;
    for token in &mut tokens {
        token.offset += base_offset;
    }

    let mut handlers: Vec<(GrammarId, Box<dyn Syntax>)> = vec![
        (GrammarId::Dynamic, Box::new(syntax::dynamic::DynamicSyntax::new())),
        (GrammarId::Inline, Box::new(syntax::inline::InlineSyntax::new())),
        (GrammarId::Raw, Box::new(syntax::plain::PlainSyntax::new())),
    ];
    let mut asm = Assembler::new(Node::Template(Template::new(pctx.path)));
    run_tokens(pctx, &mut asm, &tokens, &mut handlers)?;

    match asm.finish() {
        Ok(Node::Template(t)) => Ok(t.children),
        Ok(_) => unreachable!("fragment root is a template"),
        Err((message, token)) => Err(match token {
            Some(t) => pctx.syntax_error(message, &t),
            None => TplError::syntax(&pctx.source.filename, 1, 1, message, &pctx.source.content),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn src(content: &str) -> Source {
        Source {
            content: content.to_string(),
            filename: "test.mb".to_string(),
        }
    }

    fn parse(content: &str) -> Result<Node, TplError> {
        Parser::new().with_path("test").parse(&src(content))
    }

    fn children(node: &Node) -> &[Node] {
        match node {
            Node::Template(t) => &t.children,
            Node::Tag(t) => &t.children,
            _ => panic!("no children"),
        }
    }

    #[test]
    fn nested_tags() {
        let root = parse("<div><b>x</b></div>").unwrap();
        let div = &children(&root)[0];
        assert_eq!(div.name(), Some("div"));
        let b = &children(div)[0];
        assert_eq!(b.name(), Some("b"));
        let Node::Raw(raw) = &children(b)[0] else {
            panic!()
        };
        assert_eq!(raw.text, "x");
    }

    #[test]
    fn text_and_echo_order_preserved() {
        let root = parse("a{{ x }}b").unwrap();
        let kinds: Vec<_> = children(&root).iter().map(Node::kind).collect();
        assert_eq!(kinds, vec![NodeKind::Raw, NodeKind::Echo, NodeKind::Raw]);
    }

    #[test]
    fn unmatched_close_is_structural_error() {
        let err = parse("</x>").unwrap_err();
        assert!(matches!(err, TplError::Syntax { .. }), "{err}");
    }

    #[test]
    fn mismatched_nesting_reports_unclosed() {
        let err = parse("<b><i></b>").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("未闭合"), "{text}");
    }

    #[test]
    fn unclosed_at_eof_reports_unclosed() {
        let err = parse("<div>abc").unwrap_err();
        assert!(err.to_string().contains("div"), "{err}");
    }

    #[test]
    fn void_element_needs_no_close() {
        let root = parse("<br>after").unwrap();
        let kinds: Vec<_> = children(&root).iter().map(Node::kind).collect();
        assert_eq!(kinds, vec![NodeKind::Tag, NodeKind::Raw]);
    }

    #[test]
    fn attr_value_with_inline_inject() {
        let root = parse("<b value=\"${value}\">x</b>").unwrap();
        let Node::Tag(tag) = &children(&root)[0] else {
            panic!()
        };
        let Node::Attr(attr) = &tag.attrs[0] else {
            panic!()
        };
        assert_eq!(attr.name, "value");
        assert_eq!(attr.value.len(), 1);
        assert_eq!(attr.value[0].kind(), NodeKind::Inline);
    }

    #[test]
    fn boolean_attribute_empty_value() {
        let root = parse("<input disabled/>").unwrap();
        let Node::Tag(tag) = &children(&root)[0] else {
            panic!()
        };
        let Node::Attr(attr) = &tag.attrs[0] else {
            panic!()
        };
        assert_eq!(attr.name, "disabled");
        assert!(attr.value.is_empty());
    }

    #[test]
    fn directive_without_body() {
        let root = parse("@if(ok)a@else b@endif").unwrap();
        let kinds: Vec<_> = children(&root).iter().map(Node::kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Directive,
                NodeKind::Raw,
                NodeKind::Directive,
                NodeKind::Raw,
                NodeKind::Directive,
            ]
        );
    }

    #[test]
    fn with_path_does_not_mutate_original() {
        let parser = Parser::new();
        let bound = parser.with_path("a/b");
        let root = bound.parse(&src("x")).unwrap();
        let Node::Template(t) = &root else { panic!() };
        assert_eq!(t.path.as_deref(), Some("a/b"));

        let root2 = parser.parse(&src("x")).unwrap();
        let Node::Template(t2) = &root2 else { panic!() };
        assert!(t2.path.is_none());
    }
}
