use crate::compiler::result::CompileResult;
use crate::compiler::{CompileFailure, Compiler};
use crate::error::TplError;
use crate::loader::{Loader, Source, line_col};
use crate::node::{Context, Node};
use crate::parser::Parser;
use crate::sourcemap::SourceMap;
use crate::transform;
use crate::traverser::Traverser;
use crate::visitor::{Scope, Visitor};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// 访问者阶段，顺序固定不可重排
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Transform,
    Finalize,
    Compile,
}

const STAGES: usize = 4;

/// 单次编译调用的共享状态：已加载源码（同一路径内容稳定）
/// 与活跃加载链（循环检测）。逐次编译重建，Builder 自身无状态。
#[derive(Default)]
pub struct CompileState {
    pub sources: HashMap<String, Source>,
    pub chain: Vec<String>,
}

/// 错误注解的归类
#[derive(Debug, Clone, Copy)]
pub enum ErrKind {
    Parse,
    Compile,
    Import,
    Extends,
}

pub type VisitorFactory = Box<dyn Fn() -> Box<dyn Visitor>>;

/// Builder 内核：加载器、解析器与各阶段访问者工厂。
/// 变换访问者经 Rc 回调到这里递归加载引入/父模板。
pub struct Core {
    pub loader: Box<dyn Loader>,
    pub parser: Parser,
    user_visitors: [Vec<VisitorFactory>; STAGES],
}

impl Core {
    /// 加载源码（一次编译内缓存，保证同路径内容稳定）
    pub fn load(&self, path: &str, state: &Rc<RefCell<CompileState>>) -> Result<Source, TplError> {
        if let Some(source) = state.borrow().sources.get(path) {
            return Ok(source.clone());
        }
        let source = self.loader.load(path)?;
        state
            .borrow_mut()
            .sources
            .insert(path.to_string(), source.clone());
        Ok(source)
    }

    /// 加载并准备一棵模板树：解析 → prepare → transform。
    /// 引入与继承在 transform 内递归回到这里。
    pub fn load_tree(
        core: &Rc<Self>,
        path: &str,
        state: &Rc<RefCell<CompileState>>,
    ) -> Result<Node, TplError> {
        // 兜底循环保护；变换访问者会先行给出带上下文的错误
        if state.borrow().chain.iter().any(|p| p == path) {
            let chain = state.borrow().chain.join(" → ");
            return Err(TplError::Loader(format!("检测到循环加载：{chain} → {path}")));
        }

        state.borrow_mut().chain.push(path.to_string());
        let result = (|| {
            let source = core.load(path, state)?;
            let parser = core.parser.with_path(path);
            let root = parser.parse(&source)?;
            let root = Self::run_stage(core, root, Stage::Prepare, state)?;
            Self::run_stage(core, root, Stage::Transform, state)
        })();
        state.borrow_mut().chain.pop();
        result
    }

    /// 以全新遍历器跑一个阶段：内建访问者在前，注册的访问者按序在后
    pub fn run_stage(
        core: &Rc<Self>,
        root: Node,
        stage: Stage,
        state: &Rc<RefCell<CompileState>>,
    ) -> Result<Node, TplError> {
        let mut visitors: Vec<Box<dyn Visitor>> = match stage {
            Stage::Prepare => vec![Box::new(transform::define_blocks::DefineBlocks)],
            Stage::Transform => vec![
                Box::new(transform::resolve_imports::ResolveImports::new(
                    core.clone(),
                    state.clone(),
                )),
                Box::new(transform::extends_parent::ExtendsParent::new(
                    core.clone(),
                    state.clone(),
                )),
            ],
            Stage::Finalize => vec![Box::new(transform::validate::ValidateDirectives::new(
                core.clone(),
                state.clone(),
            ))],
            Stage::Compile => Vec::new(),
        };
        for factory in &core.user_visitors[stage as usize] {
            visitors.push(factory());
        }

        let refs: Vec<&mut dyn Visitor> =
            visitors.iter_mut().map(|v| &mut **v as &mut dyn Visitor).collect();
        let mut traverser = Traverser::new(refs);
        let mut out = traverser.traverse(vec![root], &Scope::root())?;
        match out.len() {
            1 => Ok(out.pop().expect("checked len")),
            _ => Err(TplError::Loader("访问者移除了模板根节点".to_string())),
        }
    }

    /// 以节点上下文构造带 文件:行:列 与源码摘录的错误
    pub fn annotate(
        &self,
        state: &Rc<RefCell<CompileState>>,
        kind: ErrKind,
        message: impl Into<String>,
        ctx: Option<&Context>,
    ) -> TplError {
        let message = message.into();
        let (filename, content, offset) = match ctx {
            Some(ctx) => {
                let path = ctx.path.as_deref().unwrap_or("<未知>");
                match state.borrow().sources.get(path) {
                    Some(source) => (
                        source.filename.clone(),
                        source.content.clone(),
                        ctx.token.offset,
                    ),
                    None => (path.to_string(), String::new(), 0),
                }
            }
            None => ("<未知>".to_string(), String::new(), 0),
        };
        let (line, col) = line_col(&content, offset);
        match kind {
            ErrKind::Parse => TplError::parse(&filename, line, col, message, &content),
            ErrKind::Compile => TplError::compile(&filename, line, col, message, &content),
            ErrKind::Import => TplError::import(&filename, line, col, message, &content),
            ErrKind::Extends => TplError::extends(&filename, line, col, message, &content),
        }
    }
}

/// 一次编译的产物：渲染程序文本 + 源码映射 + 根模板文件
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub content: String,
    pub source_map: SourceMap,
    pub root: String,
}

/// 编排者：加载 → 解析 → prepare/transform/finalize/compile
/// 四阶段访问者 → 渲染器代码生成。
/// 实例不持有跨调用可变状态，可为不同模板并发调用。
pub struct Builder {
    core: Rc<Core>,
    compiler: Compiler,
}

impl Builder {
    pub fn new(loader: Box<dyn Loader>) -> Self {
        Self {
            core: Rc::new(Core {
                loader,
                parser: Parser::new(),
                user_visitors: Default::default(),
            }),
            compiler: Compiler::new(),
        }
    }

    /// 注册阶段访问者（构造工厂：每次阶段调用都拿到全新实例）。
    /// 阶段内按注册顺序执行，顺序承载语义。
    pub fn add_visitor(&mut self, stage: Stage, factory: VisitorFactory) {
        Rc::get_mut(&mut self.core)
            .expect("编译进行中不可注册访问者")
            .user_visitors[stage as usize]
            .push(factory);
    }

    /// 替换解析器配置（自定义文法/语法组合）
    pub fn set_parser(&mut self, parser: Parser) {
        Rc::get_mut(&mut self.core)
            .expect("编译进行中不可更换解析器")
            .parser = parser;
    }

    pub fn compiler_mut(&mut self) -> &mut Compiler {
        &mut self.compiler
    }

    /// 编译一个模板：产出渲染程序与源码映射
    pub fn compile(&self, name: &str) -> Result<CompiledTemplate, TplError> {
        tracing::debug!("编译模板 {name}");
        let state = Rc::new(RefCell::new(CompileState::default()));

        let root = Core::load_tree(&self.core, name, &state)?;
        let root = Core::run_stage(&self.core, root, Stage::Finalize, &state)?;
        let root = Core::run_stage(&self.core, root, Stage::Compile, &state)?;

        let mut res = CompileResult::new();
        self.compiler
            .compile_node(&mut res, &root)
            .map_err(|failure| self.annotate_failure(&state, failure))?;

        let st = state.borrow();
        let (content, mut source_map) = res.into_parts(|path, offset| {
            match st.sources.get(path) {
                Some(source) => (
                    source.filename.clone(),
                    line_col(&source.content, offset).0,
                ),
                None => (path.to_string(), 0),
            }
        });

        // 被完全覆写的父模板可能没有产出任何指令，但仍被消费过：
        // 清单以实际加载记录为准
        for source in st.sources.values() {
            if !source_map.paths.iter().any(|p| p == &source.filename) {
                source_map.paths.push(source.filename.clone());
            }
        }
        source_map.paths.sort();

        let root_filename = st
            .sources
            .get(name)
            .map(|s| s.filename.clone())
            .unwrap_or_else(|| name.to_string());

        Ok(CompiledTemplate {
            content,
            source_map,
            root: root_filename,
        })
    }

    fn annotate_failure(
        &self,
        state: &Rc<RefCell<CompileState>>,
        failure: CompileFailure,
    ) -> TplError {
        self.core
            .annotate(state, ErrKind::Compile, failure.message, failure.context.as_ref())
    }
}
