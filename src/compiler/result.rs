use crate::node::Context;
use crate::sourcemap::{SourceLocation, SourceMap, SourceMapEntry};
use std::collections::BTreeSet;

/// 未解析的源位置：路径 + 字节偏移。
/// 行号需要源码才能换算，由 Builder 在编译收尾时统一解析。
#[derive(Debug, Clone)]
pub struct RawLocation {
    pub path: String,
    pub offset: usize,
}

/// 单次编译的累积结果：生成的渲染程序文本、
/// 每个生成行的位置链、消费过的模板路径。
///
/// 渲染程序按行组织（一行一条指令），生成行号与
/// 源码映射条目因此一一对应。
#[derive(Debug, Default)]
pub struct CompileResult {
    pub content: String,
    lines: usize,
    /// 活跃的拼接点链（最近的引入点在栈顶）
    splices: Vec<RawLocation>,
    locations: Vec<(usize, Vec<RawLocation>)>,
    paths: BTreeSet<String>,
}

impl CompileResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条指令行并记录它的来源位置链
    pub fn push_line(&mut self, op: &str, context: Option<&Context>) {
        debug_assert!(!op.contains('\n'), "op must be a single line");
        self.content.push_str(op);
        self.content.push('\n');
        self.lines += 1;

        let mut chain = Vec::with_capacity(1 + self.splices.len());
        if let Some(ctx) = context
            && let Some(path) = &ctx.path
        {
            self.paths.insert(path.clone());
            chain.push(RawLocation {
                path: path.clone(),
                offset: ctx.token.offset,
            });
        }
        // 叶在前，宿主模板自内向外在后
        chain.extend(self.splices.iter().rev().cloned());
        if !chain.is_empty() {
            self.locations.push((self.lines, chain));
        }
    }

    /// 进入一个拼接点（嵌套模板渲染开始）
    pub fn enter_splice(&mut self, context: &Context) {
        if let Some(path) = &context.path {
            self.paths.insert(path.clone());
            self.splices.push(RawLocation {
                path: path.clone(),
                offset: context.token.offset,
            });
        }
    }

    pub fn exit_splice(&mut self) {
        self.splices.pop();
    }

    pub fn add_path(&mut self, path: &str) {
        self.paths.insert(path.to_string());
    }

    /// 收束为最终源码映射。
    /// `resolve` 把（模板路径，字节偏移）换算为（展示文件名，行号）。
    pub fn into_parts(self, resolve: impl Fn(&str, usize) -> (String, usize)) -> (String, SourceMap) {
        let mut map = SourceMap {
            entries: Vec::with_capacity(self.locations.len()),
            paths: self
                .paths
                .into_iter()
                .map(|p| resolve(&p, 0).0)
                .collect(),
        };
        for (generated_line, chain) in self.locations {
            map.push(SourceMapEntry {
                generated_line,
                chain: chain
                    .into_iter()
                    .map(|loc| {
                        let (path, line) = resolve(&loc.path, loc.offset);
                        SourceLocation { path, line }
                    })
                    .collect(),
            });
        }
        (self.content, map)
    }
}
