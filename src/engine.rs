use crate::builder::Builder;
use crate::cache::{ArtifactCache, content_key};
use crate::config::MobanConfig;
use crate::error::TplError;
use crate::loader::{FileLoader, Loader};
use crate::mapper::map_render_error;
use crate::runtime::{Executor, FunctionRegistry, LoadedUnit, Unit, UnitRegistry};
use serde_json::Value;
use std::path::Path;
use std::rc::Rc;

/// 引擎门面：编译或装载、渲染、显式失效。
///
/// 取单元的路径：注册表命中（热）→ 缓存新鲜则直接装载 →
/// 否则重新编译并写回。同键竞态不做串行化：两边都编译、
/// 后写者胜，内容对同一源码幂等，属可接受的暂时陈旧。
pub struct Engine {
    builder: Builder,
    cache: Option<ArtifactCache>,
    registry: UnitRegistry,
    funcs: FunctionRegistry,
    namespace: String,
    context_id: String,
    auto_reload: bool,
}

impl Engine {
    /// 无缓存引擎（每次取单元都重新编译，测试与一次性场景）
    pub fn new(loader: Box<dyn Loader>) -> Self {
        Self {
            builder: Builder::new(loader),
            cache: None,
            registry: UnitRegistry::new(),
            funcs: FunctionRegistry::new(),
            namespace: "default".to_string(),
            context_id: "default".to_string(),
            auto_reload: true,
        }
    }

    /// 按配置组装：文件加载器 + 磁盘缓存
    pub fn from_config(root: &Path, config: &MobanConfig) -> Self {
        let loader = FileLoader::new(root.join(&config.engine.templates_dir));
        let mut engine = Self::new(Box::new(loader));
        engine.cache = Some(ArtifactCache::new(root.join(&config.engine.cache_dir)));
        engine.namespace = config.engine.namespace.clone();
        engine.context_id = config.engine.context_id.clone();
        engine.auto_reload = config.engine.auto_reload;
        engine
    }

    pub fn with_cache(mut self, cache: ArtifactCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_auto_reload(mut self, auto_reload: bool) -> Self {
        self.auto_reload = auto_reload;
        self
    }

    pub fn builder_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }

    pub fn funcs_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.funcs
    }

    pub fn unit_key(&self, name: &str) -> String {
        content_key(&self.namespace, name, &self.context_id)
    }

    /// 取可执行单元（编译或装载）
    pub fn get(&mut self, name: &str) -> Result<Rc<LoadedUnit>, TplError> {
        let key = self.unit_key(name);

        if let Some(loaded) = self.registry.get(&key) {
            match &self.cache {
                // 热单元：关闭自动重载或缓存仍新鲜时直接复用
                Some(cache) if self.auto_reload => {
                    if cache.is_fresh(&key) {
                        return Ok(loaded);
                    }
                    tracing::debug!("模板 {name} 已过期，重新编译");
                }
                _ => return Ok(loaded),
            }
        }

        if let Some(cache) = &self.cache
            && !self.registry.has(&key)
            && cache.is_fresh(&key)
        {
            let (content, map) = cache.load(&key)?;
            let unit = Unit::parse(&content)
                .map_err(|e| map_render_error(e, Some(&map.source_map), &map.root))?;
            tracing::debug!("模板 {name} 从缓存装载");
            return Ok(self.registry.register(
                key,
                LoadedUnit {
                    unit,
                    source_map: Some(map.source_map),
                    root: map.root,
                },
            ));
        }

        let compiled = self.builder.compile(name)?;
        if let Some(cache) = &self.cache {
            cache.write(&key, &compiled)?;
        }
        let unit = Unit::parse(&compiled.content)
            .map_err(|e| map_render_error(e, Some(&compiled.source_map), &compiled.root))?;
        tracing::info!("模板 {name} 编译完成");
        Ok(self.registry.register(
            key,
            LoadedUnit {
                unit,
                source_map: Some(compiled.source_map),
                root: compiled.root,
            },
        ))
    }

    /// 渲染模板。运行期失败经源码映射改写为模板位置后抛出。
    pub fn render(&mut self, name: &str, data: &Value) -> Result<String, TplError> {
        let loaded = self.get(name)?;
        Executor::new(&self.funcs)
            .execute(&loaded.unit, data)
            .map_err(|e| map_render_error(e, loaded.source_map.as_ref(), &loaded.root))
    }

    /// 仅编译（产出渲染程序文本，不执行）
    pub fn compile(&mut self, name: &str) -> Result<String, TplError> {
        let key = self.unit_key(name);
        if let Some(cache) = &self.cache
            && cache.is_fresh(&key)
        {
            return Ok(cache.load(&key)?.0);
        }
        let compiled = self.builder.compile(name)?;
        if let Some(cache) = &self.cache {
            cache.write(&key, &compiled)?;
        }
        Ok(compiled.content)
    }

    /// 显式失效：模板被外部改动时调用
    pub fn reset(&mut self, name: &str) -> Result<(), TplError> {
        let key = self.unit_key(name);
        self.registry.remove(&key);
        if let Some(cache) = &self.cache {
            cache.delete(&key)?;
        }
        Ok(())
    }
}
