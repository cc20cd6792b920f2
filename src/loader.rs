use crate::error::TplError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 模板文件扩展名
pub const TEMPLATE_EXT: &str = ".mb";

/// 一份已加载的模板源码
#[derive(Debug, Clone)]
pub struct Source {
    pub content: String,
    /// 展示用文件名（错误信息与源码映射中使用）
    pub filename: String,
}

/// 模板源加载器：同一次编译内对同一路径必须返回稳定内容
pub trait Loader {
    fn load(&self, path: &str) -> Result<Source, TplError>;
}

/// 基于目录的文件加载器，模板名映射为 `<root>/<name>.mb`
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let name = if path.ends_with(TEMPLATE_EXT) {
            path.to_string()
        } else {
            format!("{path}{TEMPLATE_EXT}")
        };
        self.root.join(name)
    }
}

impl Loader for FileLoader {
    fn load(&self, path: &str) -> Result<Source, TplError> {
        let file = self.resolve(path);
        // 模板名不允许逃出模板根目录
        if path.split(['/', '\\']).any(|seg| seg == "..") {
            return Err(TplError::Loader(format!("非法模板路径 '{path}'")));
        }
        let content = std::fs::read_to_string(&file)
            .map_err(|e| TplError::Loader(format!("读取 {} 失败：{e}", file.display())))?;
        Ok(Source {
            content,
            filename: file.to_string_lossy().into_owned(),
        })
    }
}

/// 内存加载器，测试与内嵌模板使用
#[derive(Default)]
pub struct StringLoader {
    templates: HashMap<String, String>,
}

impl StringLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.templates.insert(name.into(), content.into());
    }
}

impl Loader for StringLoader {
    fn load(&self, path: &str) -> Result<Source, TplError> {
        match self.templates.get(path) {
            Some(content) => Ok(Source {
                content: content.clone(),
                filename: path.to_string(),
            }),
            None => Err(TplError::Loader(format!("未注册的模板 '{path}'"))),
        }
    }
}

/// 将字节偏移转换为 1 起始的行列号
pub fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in content.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// 列出目录下全部模板文件（相对模板名，去掉扩展名）
pub fn scan_templates(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    scan_dir(root, root, &mut found);
    found.sort();
    found
}

fn scan_dir(base: &Path, dir: &Path, found: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(base, &path, found);
        } else if path.to_string_lossy().ends_with(TEMPLATE_EXT) {
            let Ok(rel) = path.strip_prefix(base) else {
                continue;
            };
            let name = rel.to_string_lossy();
            found.push(name.trim_end_matches(TEMPLATE_EXT).to_string());
        }
    }
}
