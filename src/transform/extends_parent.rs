use super::{name_suffix, static_attr};
use crate::builder::{CompileState, Core, ErrKind};
use crate::error::TplError;
use crate::node::{Block, Node, Tag};
use crate::visitor::{LeaveAction, Scope, Visitor};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// transform 阶段内建访问者（在引入解析之后执行）：
/// 声明 `<extends:父模板/>` 的模板以父树为基底，
/// 同名块覆写父块内容；覆写体内的 `${parent}` 标记
/// 原位展开为父块原有内容；父树中没有槽位的子块
/// 收集为游离块备用。
///
/// extends 标签上的属性是编译期注入值：父树中的
/// 同名注入点直接替换为属性值节点，未匹配的注入点
/// 保留运行期默认值回退。
pub struct ExtendsParent {
    core: Rc<Core>,
    state: Rc<RefCell<CompileState>>,
}

impl ExtendsParent {
    pub fn new(core: Rc<Core>, state: Rc<RefCell<CompileState>>) -> Self {
        Self { core, state }
    }
}

impl Visitor for ExtendsParent {
    // 在离开根模板时合并：此时子树里的引入已全部解析完毕，
    // 引入解析先于继承解析的阶段内顺序由此保证
    fn leave_node(&mut self, node: &mut Node, scope: &Scope) -> Result<LeaveAction, TplError> {
        // 只对本次加载的根模板生效；拼接进来的嵌套模板已各自解析过继承
        if scope.depth() != 1 {
            return Ok(LeaveAction::Continue);
        }
        let Node::Template(tpl) = node else {
            return Ok(LeaveAction::Continue);
        };

        let Some(extends) = find_extends(&tpl.children) else {
            return Ok(LeaveAction::Continue);
        };

        let (parent_path, extends_ctx) = {
            let Node::Tag(tag) = &tpl.children[extends] else {
                unreachable!("find_extends 只返回标签下标");
            };
            let target = if let Some(name) = name_suffix(&tag.name, "extends") {
                name.to_string()
            } else {
                match static_attr(tag, "path") {
                    Some(path) => path.to_string(),
                    None => {
                        return Err(self.core.annotate(
                            &self.state,
                            ErrKind::Extends,
                            "继承路径必须是静态的 path 属性",
                            Some(&tag.context),
                        ));
                    }
                }
            };
            (target, tag.context.clone())
        };

        if self.state.borrow().chain.iter().any(|p| p == &parent_path) {
            let chain = self.state.borrow().chain.join(" → ");
            return Err(self.core.annotate(
                &self.state,
                ErrKind::Extends,
                format!("检测到循环继承：{chain} → {parent_path}"),
                Some(&extends_ctx),
            ));
        }

        let parent_tree = Core::load_tree(&self.core, &parent_path, &self.state)?;
        let Node::Template(parent) = parent_tree else {
            unreachable!("load_tree 始终返回模板根");
        };

        // 子模板中只有块参与合并，extends 标签携带注入值，其余丢弃
        let mut blocks: Vec<(String, Block)> = Vec::new();
        let mut values: Vec<(String, Vec<Node>)> = Vec::new();
        for child in tpl.children.drain(..) {
            match child {
                Node::Block(block) => blocks.push((block.name.clone(), block)),
                Node::Tag(tag) if is_extends_tag(&tag) => {
                    for attr in &tag.attrs {
                        if let Node::Attr(attr) = attr
                            && attr.name != "path"
                        {
                            values.push((attr.name.clone(), attr.value.clone()));
                        }
                    }
                }
                _ => {}
            }
        }

        let mut base = parent.children;
        let mut used = HashSet::new();
        overlay_blocks(&mut base, &blocks, &mut used);
        inject_values(&mut base, &values);

        tpl.children = base;
        tpl.outer.extend(parent.outer);
        for (name, block) in blocks {
            if !used.contains(&name) {
                tpl.outer.push(Node::Block(block));
            }
        }
        Ok(LeaveAction::Continue)
    }
}

fn is_extends_tag(tag: &Tag) -> bool {
    tag.name == "extends" || name_suffix(&tag.name, "extends").is_some()
}

fn find_extends(children: &[Node]) -> Option<usize> {
    children.iter().position(|node| {
        matches!(node, Node::Tag(tag) if is_extends_tag(tag))
    })
}

/// 父树中与子块同名的块被覆写；覆写体内的 `${parent}`
/// 标记展开为父块原有内容
fn overlay_blocks(nodes: &mut Vec<Node>, blocks: &[(String, Block)], used: &mut HashSet<String>) {
    for node in nodes.iter_mut() {
        match node {
            Node::Block(parent_block) => {
                if let Some((_, child)) = blocks.iter().find(|(n, _)| *n == parent_block.name) {
                    used.insert(parent_block.name.clone());
                    let parent_body = std::mem::take(&mut parent_block.children);
                    parent_block.children =
                        splice_parent_marker(child.children.clone(), &parent_body);
                } else {
                    overlay_blocks(&mut parent_block.children, blocks, used);
                }
            }
            Node::Tag(tag) => {
                overlay_blocks(&mut tag.attrs, blocks, used);
                overlay_blocks(&mut tag.children, blocks, used);
            }
            Node::Attr(attr) => overlay_blocks(&mut attr.value, blocks, used),
            Node::Template(tpl) => overlay_blocks(&mut tpl.children, blocks, used),
            _ => {}
        }
    }
}

fn splice_parent_marker(nodes: Vec<Node>, parent_body: &[Node]) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Inline(inline) if inline.name == "parent" => {
                out.extend(parent_body.iter().cloned());
            }
            Node::Tag(mut tag) => {
                tag.children = splice_parent_marker(tag.children, parent_body);
                out.push(Node::Tag(tag));
            }
            Node::Block(mut block) => {
                block.children = splice_parent_marker(block.children, parent_body);
                out.push(Node::Block(block));
            }
            other => out.push(other),
        }
    }
    out
}

/// 注入点替换为 extends 标签上的属性值节点（编译期注入）
fn inject_values(nodes: &mut Vec<Node>, values: &[(String, Vec<Node>)]) {
    if values.is_empty() {
        return;
    }
    let drained = std::mem::take(nodes);
    for mut node in drained {
        match &mut node {
            Node::Inline(inline) => {
                if let Some((_, value)) = values.iter().find(|(n, _)| *n == inline.name) {
                    nodes.extend(value.iter().cloned());
                    continue;
                }
            }
            Node::Tag(tag) => {
                inject_values(&mut tag.attrs, values);
                inject_values(&mut tag.children, values);
            }
            Node::Attr(attr) => inject_values(&mut attr.value, values),
            Node::Block(block) => inject_values(&mut block.children, values),
            Node::Template(tpl) => inject_values(&mut tpl.children, values),
            _ => {}
        }
        nodes.push(node);
    }
}
