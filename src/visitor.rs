use crate::error::TplError;
use crate::node::{Context, Node, NodeKind};

/// `enter_node` 的控制信号
pub enum EnterAction {
    /// 正常继续
    Continue,
    /// 以新节点替换当前节点后继续
    Replace(Node),
    /// 跳过子节点遍历；本节点的 `leave_node` 仍对所有访问者调用
    SkipChildren,
    /// 跳过子节点，且本节点对后续访问者短路
    /// （已进入的访问者仍会收到 `leave_node`）
    SkipNode,
    /// 终止整个遍历
    Stop,
}

/// `leave_node` 的控制信号
pub enum LeaveAction {
    Continue,
    Replace(Node),
    /// 从父集合中移除本节点
    Remove,
    Stop,
}

/// 祖先链快照中的一项：变体、名字与上下文的轻量描述，
/// 不持有节点引用（快照随下行重建，树中不存在回指）。
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub context: Option<Context>,
}

impl ScopeEntry {
    pub fn of(node: &Node) -> Self {
        Self {
            kind: node.kind(),
            name: node.name().map(str::to_string),
            context: node.context().cloned(),
        }
    }
}

/// 根到当前节点的祖先链快照，每步遍历前重建，对访问者只读
#[derive(Debug, Clone, Default)]
pub struct Scope {
    entries: Vec<ScopeEntry>,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with(&self, entry: ScopeEntry) -> Self {
        let mut entries = self.entries.clone();
        entries.push(entry);
        Self { entries }
    }

    /// 当前节点自身的描述（链尾）
    pub fn current(&self) -> Option<&ScopeEntry> {
        self.entries.last()
    }

    /// 直接父节点的描述
    pub fn parent(&self) -> Option<&ScopeEntry> {
        self.entries.len().checked_sub(2).map(|i| &self.entries[i])
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScopeEntry> {
        self.entries.iter()
    }
}

/// 树访问者。两个回调都可返回控制信号改变遍历行为，
/// 默认实现全部直通。
pub trait Visitor {
    fn enter_node(&mut self, node: &mut Node, scope: &Scope) -> Result<EnterAction, TplError> {
        let _ = (node, scope);
        Ok(EnterAction::Continue)
    }

    fn leave_node(&mut self, node: &mut Node, scope: &Scope) -> Result<LeaveAction, TplError> {
        let _ = (node, scope);
        Ok(LeaveAction::Continue)
    }
}
