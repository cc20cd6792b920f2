use super::name_suffix;
use crate::error::TplError;
use crate::node::{Block, Node};
use crate::visitor::{EnterAction, Scope, Visitor};

/// prepare 阶段内建访问者：把 `<block:名字>` 标签定义为块节点。
/// 自闭合写法 `<block:名字/>` 得到空块。
pub struct DefineBlocks;

impl Visitor for DefineBlocks {
    fn enter_node(&mut self, node: &mut Node, _scope: &Scope) -> Result<EnterAction, TplError> {
        let Node::Tag(tag) = node else {
            return Ok(EnterAction::Continue);
        };
        let Some(name) = name_suffix(&tag.name, "block") else {
            return Ok(EnterAction::Continue);
        };
        Ok(EnterAction::Replace(Node::Block(Block {
            context: tag.context.clone(),
            name: name.to_string(),
            children: std::mem::take(&mut tag.children),
        })))
    }
}
