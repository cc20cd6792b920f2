use crate::error::TplError;
use crate::node::Node;
use crate::visitor::{EnterAction, LeaveAction, Scope, ScopeEntry, Visitor};

/// 深度优先遍历引擎：前序 `enter_node`、后序 `leave_node`，
/// 访问者按注册顺序调用（离开阶段同序，不反转）。
///
/// 单次遍历内非重入；每个阶段由 Builder 构造全新实例。
pub struct Traverser<'a> {
    visitors: Vec<&'a mut dyn Visitor>,
    stopped: bool,
}

impl<'a> Traverser<'a> {
    pub fn new(visitors: Vec<&'a mut dyn Visitor>) -> Self {
        Self {
            visitors,
            stopped: false,
        }
    }

    /// 遍历一个节点序列，返回变换后的序列。
    /// `Stop` 之后剩余节点原样保留。
    pub fn traverse(&mut self, nodes: Vec<Node>, scope: &Scope) -> Result<Vec<Node>, TplError> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut iter = nodes.into_iter();

        while let Some(mut node) = iter.next() {
            if self.stopped {
                out.push(node);
                out.extend(iter);
                break;
            }

            let node_scope = scope.with(ScopeEntry::of(&node));
            let mut traverse_children = true;
            // 短路信号的发出者：离开阶段只走到它为止
            let mut break_visitor: Option<usize> = None;

            for (index, visitor) in self.visitors.iter_mut().enumerate() {
                match visitor.enter_node(&mut node, &node_scope)? {
                    EnterAction::Continue => {}
                    EnterAction::Replace(new) => node = new,
                    EnterAction::SkipChildren => traverse_children = false,
                    EnterAction::SkipNode => {
                        traverse_children = false;
                        break_visitor = Some(index);
                        break;
                    }
                    EnterAction::Stop => {
                        self.stopped = true;
                        break;
                    }
                }
            }
            if self.stopped {
                out.push(node);
                out.extend(iter);
                break;
            }

            if traverse_children {
                self.traverse_children(&mut node, &node_scope)?;
                if self.stopped {
                    out.push(node);
                    out.extend(iter);
                    break;
                }
            }

            let mut removed = false;
            for (index, visitor) in self.visitors.iter_mut().enumerate() {
                match visitor.leave_node(&mut node, &node_scope)? {
                    LeaveAction::Continue => {}
                    LeaveAction::Replace(new) => node = new,
                    LeaveAction::Remove => removed = true,
                    LeaveAction::Stop => {
                        self.stopped = true;
                        break;
                    }
                }
                if break_visitor == Some(index) {
                    break;
                }
            }

            if !removed {
                out.push(node);
            }
            if self.stopped {
                out.extend(iter);
                break;
            }
        }

        Ok(out)
    }

    /// 按变体逐一遍历节点声明的全部子集合
    fn traverse_children(&mut self, node: &mut Node, scope: &Scope) -> Result<(), TplError> {
        match node {
            Node::Template(t) => {
                t.children = self.traverse(std::mem::take(&mut t.children), scope)?;
                if self.stopped {
                    return Ok(());
                }
                t.outer = self.traverse(std::mem::take(&mut t.outer), scope)?;
            }
            Node::Tag(t) => {
                t.attrs = self.traverse(std::mem::take(&mut t.attrs), scope)?;
                if self.stopped {
                    return Ok(());
                }
                t.children = self.traverse(std::mem::take(&mut t.children), scope)?;
            }
            Node::Attr(a) => {
                a.value = self.traverse(std::mem::take(&mut a.value), scope)?;
            }
            Node::Block(b) => {
                b.children = self.traverse(std::mem::take(&mut b.children), scope)?;
            }
            Node::Echo(_) | Node::Directive(_) | Node::Inline(_) | Node::Raw(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::{Token, TokenKind};
    use crate::node::{Block, Context, NodeKind, Raw, Tag};

    fn ctx() -> Context {
        Context {
            token: Token::new(TokenKind::Raw, 0, ""),
            path: Some("test".to_string()),
        }
    }

    fn raw(text: &str) -> Node {
        Node::Raw(Raw {
            context: ctx(),
            text: text.to_string(),
        })
    }

    fn tag(name: &str, children: Vec<Node>) -> Node {
        let mut t = Tag::new(name, ctx());
        t.children = children;
        Node::Tag(t)
    }

    /// 记录访问顺序的探针
    #[derive(Default)]
    struct Recorder {
        entered: Vec<String>,
        left: Vec<String>,
    }

    fn label(node: &Node) -> String {
        match node {
            Node::Raw(r) => format!("raw:{}", r.text),
            Node::Tag(t) => format!("tag:{}", t.name),
            Node::Block(b) => format!("block:{}", b.name),
            other => format!("{:?}", other.kind()),
        }
    }

    impl Visitor for Recorder {
        fn enter_node(&mut self, node: &mut Node, _: &Scope) -> Result<EnterAction, TplError> {
            self.entered.push(label(node));
            Ok(EnterAction::Continue)
        }

        fn leave_node(&mut self, node: &mut Node, _: &Scope) -> Result<LeaveAction, TplError> {
            self.left.push(label(node));
            Ok(LeaveAction::Continue)
        }
    }

    /// 对指定标签发出给定进入信号
    struct SignalOn {
        target: &'static str,
        signal: fn() -> EnterAction,
    }

    impl Visitor for SignalOn {
        fn enter_node(&mut self, node: &mut Node, _: &Scope) -> Result<EnterAction, TplError> {
            if node.name() == Some(self.target) {
                return Ok((self.signal)());
            }
            Ok(EnterAction::Continue)
        }
    }

    #[test]
    fn depth_first_enter_leave_order() {
        let tree = vec![tag("a", vec![raw("x"), tag("b", vec![raw("y")])])];
        let mut rec = Recorder::default();
        let mut tr = Traverser::new(vec![&mut rec]);
        tr.traverse(tree, &Scope::root()).unwrap();

        assert_eq!(rec.entered, vec!["tag:a", "raw:x", "tag:b", "raw:y"]);
        assert_eq!(rec.left, vec!["raw:x", "raw:y", "tag:b", "tag:a"]);
    }

    #[test]
    fn skip_children_still_calls_leave_for_all_visitors() {
        let tree = vec![tag("a", vec![raw("x"), raw("y")])];
        let mut skip = SignalOn {
            target: "a",
            signal: || EnterAction::SkipChildren,
        };
        let mut rec = Recorder::default();
        let mut tr = Traverser::new(vec![&mut skip, &mut rec]);
        tr.traverse(tree, &Scope::root()).unwrap();

        // 后代的 enter 一律未发生
        assert_eq!(rec.entered, vec!["tag:a"]);
        // 本节点的 leave 对所有访问者仍然调用
        assert_eq!(rec.left, vec!["tag:a"]);
    }

    #[test]
    fn skip_node_short_circuits_later_visitors() {
        let tree = vec![tag("a", vec![raw("x")])];
        let mut skip = SignalOn {
            target: "a",
            signal: || EnterAction::SkipNode,
        };
        let mut rec = Recorder::default();
        let mut tr = Traverser::new(vec![&mut skip, &mut rec]);
        tr.traverse(tree, &Scope::root()).unwrap();

        // 后续访问者连本节点都不再进入/离开
        assert!(rec.entered.is_empty());
        assert!(rec.left.is_empty());
    }

    #[test]
    fn stop_aborts_remaining_siblings() {
        let tree = vec![tag("a", vec![]), tag("b", vec![]), tag("c", vec![])];
        let mut stop = SignalOn {
            target: "b",
            signal: || EnterAction::Stop,
        };
        let mut rec = Recorder::default();
        let mut tr = Traverser::new(vec![&mut rec, &mut stop]);
        let out = tr.traverse(tree, &Scope::root()).unwrap();

        assert_eq!(rec.entered, vec!["tag:a", "tag:b"]);
        // 剩余兄弟节点原样保留
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn remove_strikes_node_from_parent() {
        struct RemoveRaw;
        impl Visitor for RemoveRaw {
            fn leave_node(&mut self, node: &mut Node, _: &Scope) -> Result<LeaveAction, TplError> {
                if matches!(node, Node::Raw(_)) {
                    return Ok(LeaveAction::Remove);
                }
                Ok(LeaveAction::Continue)
            }
        }
        let tree = vec![tag("a", vec![raw("x"), tag("b", vec![])])];
        let mut rm = RemoveRaw;
        let mut tr = Traverser::new(vec![&mut rm]);
        let out = tr.traverse(tree, &Scope::root()).unwrap();

        let Node::Tag(a) = &out[0] else { panic!() };
        assert_eq!(a.children.len(), 1);
        assert!(matches!(a.children[0], Node::Tag(_)));
    }

    #[test]
    fn replace_substitutes_node() {
        struct Rename;
        impl Visitor for Rename {
            fn enter_node(&mut self, node: &mut Node, _: &Scope) -> Result<EnterAction, TplError> {
                if let Node::Tag(t) = node
                    && t.name == "old"
                {
                    return Ok(EnterAction::Replace(Node::Block(Block {
                        context: t.context.clone(),
                        name: "new".to_string(),
                        children: std::mem::take(&mut t.children),
                    })));
                }
                Ok(EnterAction::Continue)
            }
        }
        let tree = vec![tag("old", vec![raw("x")])];
        let mut rn = Rename;
        let mut tr = Traverser::new(vec![&mut rn]);
        let out = tr.traverse(tree, &Scope::root()).unwrap();

        assert_eq!(out[0].kind(), NodeKind::Block);
        assert_eq!(out[0].name(), Some("new"));
    }

    #[test]
    fn scope_exposes_ancestors() {
        struct AssertParent;
        impl Visitor for AssertParent {
            fn enter_node(&mut self, node: &mut Node, scope: &Scope) -> Result<EnterAction, TplError> {
                if let Node::Raw(r) = node
                    && r.text == "y"
                {
                    assert_eq!(scope.parent().unwrap().name.as_deref(), Some("b"));
                    assert_eq!(scope.depth(), 3);
                }
                Ok(EnterAction::Continue)
            }
        }
        let tree = vec![tag("a", vec![tag("b", vec![raw("y")])])];
        let mut v = AssertParent;
        let mut tr = Traverser::new(vec![&mut v]);
        tr.traverse(tree, &Scope::root()).unwrap();
    }
}
