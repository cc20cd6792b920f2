use super::{name_suffix, static_attr};
use crate::builder::{CompileState, Core, ErrKind};
use crate::error::TplError;
use crate::node::Node;
use crate::visitor::{EnterAction, Scope, Visitor};
use std::cell::RefCell;
use std::rc::Rc;

/// transform 阶段内建访问者（先于继承解析执行）：
/// `<import:名字/>` 或 `<import path="名字"/>` 标签原位替换为
/// 被引入模板的节点树。被引入模板先走完自己的
/// 加载/解析/prepare/transform（递归），再行拼接。
///
/// 拼接以携带引入点上下文的嵌套 Template 落位，
/// 源码映射的多跳链由此而来。
pub struct ResolveImports {
    core: Rc<Core>,
    state: Rc<RefCell<CompileState>>,
}

impl ResolveImports {
    pub fn new(core: Rc<Core>, state: Rc<RefCell<CompileState>>) -> Self {
        Self { core, state }
    }
}

impl Visitor for ResolveImports {
    fn enter_node(&mut self, node: &mut Node, _scope: &Scope) -> Result<EnterAction, TplError> {
        let Node::Tag(tag) = node else {
            return Ok(EnterAction::Continue);
        };

        let target = if let Some(name) = name_suffix(&tag.name, "import") {
            name.to_string()
        } else if tag.name == "import" {
            match static_attr(tag, "path") {
                Some(path) => path.to_string(),
                None => {
                    return Err(self.core.annotate(
                        &self.state,
                        ErrKind::Import,
                        "引入路径必须是静态的 path 属性",
                        Some(&tag.context),
                    ));
                }
            }
        } else {
            return Ok(EnterAction::Continue);
        };

        // 循环引入快速失败，绝不依赖栈溢出兜底
        if self.state.borrow().chain.iter().any(|p| p == &target) {
            let chain = self.state.borrow().chain.join(" → ");
            return Err(self.core.annotate(
                &self.state,
                ErrKind::Import,
                format!("检测到循环引入：{chain} → {target}"),
                Some(&tag.context),
            ));
        }

        let tree = Core::load_tree(&self.core, &target, &self.state)?;
        let Node::Template(mut sub) = tree else {
            unreachable!("load_tree 始终返回模板根");
        };
        sub.context = Some(tag.context.clone());
        Ok(EnterAction::Replace(Node::Template(sub)))
    }
}
