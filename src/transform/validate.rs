use crate::builder::{CompileState, Core, ErrKind};
use crate::error::TplError;
use crate::node::{Context, Node, NodeKind};
use crate::visitor::{EnterAction, LeaveAction, Scope, Visitor};
use std::cell::RefCell;
use std::rc::Rc;

struct OpenBlock {
    kind: &'static str,
    else_seen: bool,
    context: Context,
}

/// finalize 阶段内建访问者：按遍历顺序（即代码生成顺序）
/// 校验控制指令配平，问题在编译期带着节点上下文暴露。
pub struct ValidateDirectives {
    core: Rc<Core>,
    state: Rc<RefCell<CompileState>>,
    stack: Vec<OpenBlock>,
}

impl ValidateDirectives {
    pub fn new(core: Rc<Core>, state: Rc<RefCell<CompileState>>) -> Self {
        Self {
            core,
            state,
            stack: Vec::new(),
        }
    }

    fn fail(&self, message: String, ctx: &Context) -> TplError {
        self.core
            .annotate(&self.state, ErrKind::Compile, message, Some(ctx))
    }
}

impl Visitor for ValidateDirectives {
    fn enter_node(
        &mut self,
        node: &mut Node,
        _scope: &Scope,
    ) -> Result<EnterAction, TplError> {
        let Node::Directive(d) = node else {
            return Ok(EnterAction::Continue);
        };
        match d.name.as_str() {
            "if" => self.stack.push(OpenBlock {
                kind: "if",
                else_seen: false,
                context: d.context.clone(),
            }),
            "for" => self.stack.push(OpenBlock {
                kind: "for",
                else_seen: false,
                context: d.context.clone(),
            }),
            "elseif" => match self.stack.last() {
                Some(open) if open.kind == "if" && !open.else_seen => {}
                Some(open) if open.kind == "if" => {
                    return Err(self.fail("@elseif 出现在 @else 之后".to_string(), &d.context));
                }
                _ => {
                    return Err(self.fail("@elseif 没有匹配的 @if".to_string(), &d.context));
                }
            },
            "else" => match self.stack.last_mut() {
                Some(open) if open.kind == "if" && !open.else_seen => open.else_seen = true,
                Some(open) if open.kind == "if" => {
                    return Err(self.fail("重复的 @else".to_string(), &d.context));
                }
                _ => {
                    return Err(self.fail("@else 没有匹配的 @if".to_string(), &d.context));
                }
            },
            "endif" => match self.stack.pop() {
                Some(open) if open.kind == "if" => {}
                _ => {
                    return Err(self.fail("@endif 没有匹配的 @if".to_string(), &d.context));
                }
            },
            "endfor" => match self.stack.pop() {
                Some(open) if open.kind == "for" => {}
                _ => {
                    return Err(self.fail("@endfor 没有匹配的 @for".to_string(), &d.context));
                }
            },
            other => {
                return Err(self.fail(format!("无法识别的指令 @{other}"), &d.context));
            }
        }
        Ok(EnterAction::Continue)
    }

    fn leave_node(&mut self, node: &mut Node, scope: &Scope) -> Result<LeaveAction, TplError> {
        // 根模板收尾：不允许留下未闭合的控制块
        if node.kind() == NodeKind::Template
            && scope.depth() == 1
            && let Some(open) = self.stack.last()
        {
            return Err(self.fail(format!("指令 @{} 未闭合", open.kind), &open.context));
        }
        Ok(LeaveAction::Continue)
    }
}
