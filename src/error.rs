use std::fmt;
use thiserror::Error;

/// 渲染错误中的模板调用栈帧
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub path: String,
    pub line: usize,
}

#[derive(Debug, Error)]
pub enum TplError {
    #[error("{}", format_error("语法错误", file, *line, *col, context, message, hint))]
    Syntax {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("解析错误", file, *line, *col, context, message, hint))]
    Parse {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("编译错误", file, *line, *col, context, message, hint))]
    Compile {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("引入错误", file, *line, *col, context, message, hint))]
    Import {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("继承错误", file, *line, *col, context, message, hint))]
    Extends {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("模板加载失败：{0}")]
    Loader(String),

    #[error("缓存操作失败：{0}")]
    Cache(String),

    #[error("{}", format_render(message, frames))]
    Render {
        message: String,
        /// 生成程序中出错的行号（映射前的定位依据）
        generated_line: usize,
        /// 映射后的模板调用栈，最外层为被渲染的根模板
        frames: Vec<Frame>,
    },
}

fn format_error(
    kind: &str,
    file: &str,
    line: usize,
    col: usize,
    context: &str,
    message: &str,
    hint: &Option<String>,
) -> String {
    let mut out = format!("moban {kind}\n  → {file}:{line}:{col}\n\n");
    if !context.is_empty() {
        out.push_str(context);
    }
    out.push_str(&format!("  错误：{message}"));
    if let Some(h) = hint {
        out.push_str(&format!("\n  提示：{h}"));
    }
    out
}

fn format_render(message: &str, frames: &[Frame]) -> String {
    let mut out = format!("moban 渲染错误\n  错误：{message}");
    for frame in frames.iter().rev() {
        out.push_str(&format!("\n  于 {}:{} (render)", frame.path, frame.line));
    }
    out
}

impl TplError {
    pub fn syntax(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::Syntax {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    pub fn syntax_with_hint(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        hint: impl fmt::Display,
        source: &str,
    ) -> Self {
        Self::Syntax {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: Some(hint.to_string()),
        }
    }

    pub fn parse(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::Parse {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    pub fn compile(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::Compile {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    pub fn import(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::Import {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    pub fn extends(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::Extends {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    /// 未经映射的运行期错误（无源码映射时按原样传递）
    pub fn render(message: impl Into<String>, generated_line: usize) -> Self {
        Self::Render {
            message: message.into(),
            generated_line,
            frames: Vec::new(),
        }
    }
}

fn build_error_context(source: &str, error_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = error_line.saturating_sub(3);
    let end = (error_line + 2).min(lines.len());

    let mut ctx = String::new();
    let width = format!("{}", end).len();
    for i in start..end {
        let marker = if i + 1 == error_line { ">" } else { " " };
        ctx.push_str(&format!(
            "  {} {:>width$} | {}\n",
            marker,
            i + 1,
            lines.get(i).unwrap_or(&""),
            width = width,
        ));
    }
    ctx
}
