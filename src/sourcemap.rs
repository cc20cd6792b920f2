use serde::{Deserialize, Serialize};

/// 一处模板源位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: String,
    pub line: usize,
}

/// 某一生成行的解析链：叶（实际来源）在前，
/// 经引入/继承拼接的宿主模板在后。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub generated_line: usize,
    pub chain: Vec<SourceLocation>,
}

/// 源码映射：生成行 → 模板位置链。
/// 拼接会让一条生成行途经多个模板，所以这里存链而非单个偏移。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    /// 按 generated_line 升序
    pub entries: Vec<SourceMapEntry>,
    /// 本次编译消费过的全部源文件路径
    pub paths: Vec<String>,
}

impl SourceMap {
    /// 查询生成行的完整解析链。
    /// 精确命中优先，否则取不大于该行的最近条目。
    pub fn chain_for_line(&self, line: usize) -> Option<&[SourceLocation]> {
        let idx = self
            .entries
            .partition_point(|e| e.generated_line <= line)
            .checked_sub(1)?;
        Some(&self.entries[idx].chain)
    }

    pub fn push(&mut self, entry: SourceMapEntry) {
        self.entries.push(entry);
    }
}
