use crate::lexer::token::Token;
use crate::node::Node;

/// 装配器：解析期间追踪当前打开的节点路径。
/// 打开进入子作用域，闭合必须与栈顶节点同名，否则解析失败。
pub struct Assembler {
    stack: Vec<Node>,
}

impl Assembler {
    pub fn new(root: Node) -> Self {
        Self { stack: vec![root] }
    }

    /// 将节点追加到当前打开的子集合
    pub fn push(&mut self, node: Node) {
        let top = self.stack.last_mut().expect("assembler stack never empty");
        children_mut(top).push(node);
    }

    /// 打开新的子作用域
    pub fn open(&mut self, node: Node) {
        self.stack.push(node);
    }

    /// 当前打开节点的名字（根 Template 无名）
    pub fn current_name(&self) -> Option<&str> {
        self.stack.last().and_then(Node::name)
    }

    /// 闭合当前作用域，名字不匹配即层级错误
    pub fn close(&mut self, name: &str) -> Result<(), String> {
        if self.stack.len() <= 1 {
            return Err(format!("无效的闭合标签 `{name}`，没有对应的打开标签"));
        }
        let top_name = self.current_name().unwrap_or_default().to_string();
        if top_name != name {
            return Err(format!("节点层级无效，`{top_name}` 未闭合"));
        }
        let node = self.stack.pop().expect("checked above");
        self.push(node);
        Ok(())
    }

    /// 流结束：栈中只允许剩下根节点
    pub fn finish(mut self) -> Result<Node, (String, Option<Token>)> {
        if self.stack.len() > 1 {
            let open = self.stack.pop().expect("len > 1");
            let name = open.name().unwrap_or_default().to_string();
            let token = open.context().map(|c| c.token.clone());
            return Err((format!("节点层级无效，`{name}` 未闭合"), token));
        }
        Ok(self.stack.pop().expect("root"))
    }
}

fn children_mut(node: &mut Node) -> &mut Vec<Node> {
    match node {
        Node::Template(t) => &mut t.children,
        Node::Tag(t) => &mut t.children,
        Node::Block(b) => &mut b.children,
        Node::Attr(a) => &mut a.value,
        // 其余变体是叶子，装配器不会以它们为作用域
        _ => unreachable!("leaf node opened as scope"),
    }
}
