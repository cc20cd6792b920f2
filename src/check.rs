use crate::builder::Builder;
use crate::config::MobanConfig;
use crate::loader::{FileLoader, scan_templates};
use anyhow::Result;
use rayon::prelude::*;
use std::path::Path;

/// 检查结果
#[derive(Debug, Default)]
pub struct CheckResult {
    pub checked: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// 检查模板目录：每个模板完整走一遍编译管道。
/// 模板之间相互独立，并行检查（Builder 无跨调用状态，
/// 每个任务各建一个）。
pub fn run(root: &Path, config: &MobanConfig) -> Result<CheckResult> {
    let templates_dir = root.join(&config.engine.templates_dir);
    let mut result = CheckResult::default();

    if !templates_dir.exists() {
        result
            .warnings
            .push(format!("模板目录不存在：{}", templates_dir.display()));
        return Ok(result);
    }

    let names = scan_templates(&templates_dir);
    if names.is_empty() {
        result.warnings.push("模板目录为空".to_string());
        return Ok(result);
    }
    result.checked = names.len();

    let mut errors: Vec<String> = names
        .par_iter()
        .filter_map(|name| {
            let builder = Builder::new(Box::new(FileLoader::new(&templates_dir)));
            match builder.compile(name) {
                Ok(_) => None,
                Err(e) => Some(format!("{name}: {e}")),
            }
        })
        .collect();
    errors.sort();
    result.errors = errors;

    Ok(result)
}
