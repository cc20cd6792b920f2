//! moban 模板编译引擎。
//!
//! 模板经多文法词法分析、语法分派、四阶段访问者变换
//! （prepare → transform → finalize → compile）与渲染器
//! 代码生成，编译为按行组织的渲染程序；程序由解释器执行。
//! 编译产物落盘缓存（内容派生键 + 依赖清单），运行期失败
//! 经源码映射改写回模板原始位置。

pub mod builder;
pub mod cache;
pub mod check;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod mapper;
pub mod node;
pub mod parser;
pub mod runtime;
pub mod sourcemap;
pub mod transform;
pub mod traverser;
pub mod visitor;

pub use builder::{Builder, CompiledTemplate, Stage};
pub use cache::ArtifactCache;
pub use config::MobanConfig;
pub use engine::Engine;
pub use error::TplError;
pub use loader::{FileLoader, Loader, Source, StringLoader};
pub use sourcemap::SourceMap;
