use crate::lexer::token::Token;

/// 节点上下文：来源 token 与所属模板路径。
/// 经过引入/继承拼接后，节点仍携带自己原始模板的上下文，
/// 这是错误定位与源码映射的唯一依据。
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub token: Token,
    pub path: Option<String>,
}

impl Context {
    pub fn new(token: &Token, path: Option<&str>) -> Self {
        Self {
            token: token.clone(),
            path: path.map(str::to_string),
        }
    }
}

/// AST 节点。封闭的和类型，遍历器与编译器对其穷尽匹配。
#[derive(Debug, Clone)]
pub enum Node {
    /// 模板根。引入拼接时也作为嵌套容器出现，
    /// 此时 context 指向引入点、path 指向被引入模板。
    Template(Template),
    /// 标记标签
    Tag(Tag),
    /// 标签属性，值为有序子节点集合（空集合即布尔属性）
    Attr(Attr),
    /// 命名块（继承/覆写的单位）
    Block(Block),
    /// `{{ expr }}` 或 `{!! expr !!}` 输出
    Echo(Echo),
    /// `@name(body)` 控制指令
    Directive(Directive),
    /// `${name|default}` 注入点
    Inline(Inline),
    /// 原始文本
    Raw(Raw),
}

#[derive(Debug, Clone, Default)]
pub struct Template {
    pub context: Option<Context>,
    pub path: Option<String>,
    pub children: Vec<Node>,
    /// 继承合并时未匹配到父槽位的"游离块"，收集备用，不内联渲染
    pub outer: Vec<Node>,
}

impl Template {
    pub fn new(path: Option<&str>) -> Self {
        Self {
            context: None,
            path: path.map(str::to_string),
            children: Vec::new(),
            outer: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub context: Context,
    pub name: String,
    /// 不包含子节点（void 元素或自闭合写法）
    pub void: bool,
    /// 源码使用了 `/>` 写法，重建输出时保留
    pub self_closing: bool,
    pub attrs: Vec<Node>,
    pub children: Vec<Node>,
}

impl Tag {
    pub fn new(name: impl Into<String>, context: Context) -> Self {
        Self {
            context,
            name: name.into(),
            void: false,
            self_closing: false,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attr {
    pub context: Context,
    pub name: String,
    pub value: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub context: Context,
    pub name: String,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct Echo {
    pub context: Context,
    pub expr: String,
    /// false 即 `{!! !!}` 原样输出
    pub escape: bool,
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub context: Context,
    pub name: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Inline {
    pub context: Context,
    pub name: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Raw {
    pub context: Context,
    pub text: String,
}

/// 节点变体标识，遍历作用域快照中使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Template,
    Tag,
    Attr,
    Block,
    Echo,
    Directive,
    Inline,
    Raw,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Template(_) => NodeKind::Template,
            Node::Tag(_) => NodeKind::Tag,
            Node::Attr(_) => NodeKind::Attr,
            Node::Block(_) => NodeKind::Block,
            Node::Echo(_) => NodeKind::Echo,
            Node::Directive(_) => NodeKind::Directive,
            Node::Inline(_) => NodeKind::Inline,
            Node::Raw(_) => NodeKind::Raw,
        }
    }

    /// 有名字的变体返回名字（标签名、块名、指令名、注入名、属性名）
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Tag(t) => Some(&t.name),
            Node::Attr(a) => Some(&a.name),
            Node::Block(b) => Some(&b.name),
            Node::Directive(d) => Some(&d.name),
            Node::Inline(i) => Some(&i.name),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&Context> {
        match self {
            Node::Template(t) => t.context.as_ref(),
            Node::Tag(t) => Some(&t.context),
            Node::Attr(a) => Some(&a.context),
            Node::Block(b) => Some(&b.context),
            Node::Echo(e) => Some(&e.context),
            Node::Directive(d) => Some(&d.context),
            Node::Inline(i) => Some(&i.context),
            Node::Raw(r) => Some(&r.context),
        }
    }
}
