pub mod executor;
pub mod expr;
pub mod funcs;
pub mod unit;

pub use executor::Executor;
pub use funcs::FunctionRegistry;
pub use unit::{Op, RenderError, Unit};

use crate::sourcemap::SourceMap;
use std::collections::HashMap;
use std::rc::Rc;

/// 已装载的可执行单元：指令 + 源码映射 + 根模板路径
#[derive(Debug)]
pub struct LoadedUnit {
    pub unit: Unit,
    pub source_map: Option<SourceMap>,
    /// 被渲染的根模板文件（映射栈在此截断）
    pub root: String,
}

/// 单元注册表：键 → 进程内已装载单元的显式映射。
/// 归引擎实例所有，取代对进程级符号表的依赖。
#[derive(Default)]
pub struct UnitRegistry {
    units: HashMap<String, Rc<LoadedUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.units.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Rc<LoadedUnit>> {
        self.units.get(key).cloned()
    }

    /// 装载单元（重复注册以新值为准）
    pub fn register(&mut self, key: impl Into<String>, unit: LoadedUnit) -> Rc<LoadedUnit> {
        let unit = Rc::new(unit);
        self.units.insert(key.into(), unit.clone());
        unit
    }

    pub fn remove(&mut self, key: &str) {
        self.units.remove(key);
    }
}
