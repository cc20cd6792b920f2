use crate::builder::CompiledTemplate;
use crate::error::TplError;
use crate::sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// 内容派生缓存键：hash(命名空间, 模板名, 渲染上下文标识)
pub fn content_key(namespace: &str, name: &str, context_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(context_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 清单条目：被消费的源文件与编译时刻的修改时间
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub mtime: u64,
}

/// 映射文件内容：源码映射 + 依赖清单 + 根模板
#[derive(Debug, Serialize, Deserialize)]
pub struct MapFile {
    pub root: String,
    pub manifest: Vec<ManifestEntry>,
    pub source_map: SourceMap,
}

/// 磁盘制品缓存。每个键两个文件：
/// `{key}.mbr` 渲染程序文本，`{key}-map.json` 映射与清单。
/// 过期判定逐条 stat 清单路径（O(依赖数)，以正确性换成本）。
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn content_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.mbr"))
    }

    fn map_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}-map.json"))
    }

    /// 持久化编译产物与依赖清单
    pub fn write(&self, key: &str, compiled: &CompiledTemplate) -> Result<(), TplError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| TplError::Cache(format!("创建缓存目录失败：{e}")))?;

        let manifest = compiled
            .source_map
            .paths
            .iter()
            .map(|path| ManifestEntry {
                path: path.clone(),
                mtime: mtime_secs(Path::new(path)).unwrap_or(0),
            })
            .collect();
        let map = MapFile {
            root: compiled.root.clone(),
            manifest,
            source_map: compiled.source_map.clone(),
        };

        std::fs::write(self.content_path(key), &compiled.content)
            .map_err(|e| TplError::Cache(format!("写入缓存制品失败：{e}")))?;
        let json = serde_json::to_string(&map)
            .map_err(|e| TplError::Cache(format!("序列化缓存清单失败：{e}")))?;
        std::fs::write(self.map_path(key), json)
            .map_err(|e| TplError::Cache(format!("写入缓存清单失败：{e}")))?;
        Ok(())
    }

    /// 新鲜度检查：清单缺失即过期；任一清单路径比制品新即过期
    pub fn is_fresh(&self, key: &str) -> bool {
        let Ok(artifact_mtime) = std::fs::metadata(self.content_path(key))
            .and_then(|m| m.modified())
        else {
            return false;
        };
        let Some(map) = self.read_map(key) else {
            return false;
        };
        for entry in &map.manifest {
            let Ok(source_mtime) = std::fs::metadata(&entry.path).and_then(|m| m.modified())
            else {
                // 源文件消失视为过期，重编译时由加载器给出准确错误
                return false;
            };
            if source_mtime > artifact_mtime {
                return false;
            }
        }
        true
    }

    /// 读取缓存制品（内容 + 映射），供注册表装载执行
    pub fn load(&self, key: &str) -> Result<(String, MapFile), TplError> {
        let content = std::fs::read_to_string(self.content_path(key))
            .map_err(|e| TplError::Cache(format!("读取缓存制品失败：{e}")))?;
        let map = self
            .read_map(key)
            .ok_or_else(|| TplError::Cache("缓存清单缺失或损坏".to_string()))?;
        Ok((content, map))
    }

    /// 删除制品与清单（不存在时静默）
    pub fn delete(&self, key: &str) -> Result<(), TplError> {
        for path in [self.content_path(key), self.map_path(key)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(TplError::Cache(format!(
                        "删除缓存文件 {} 失败：{e}",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    fn read_map(&self, key: &str) -> Option<MapFile> {
        let json = std::fs::read_to_string(self.map_path(key)).ok()?;
        serde_json::from_str(&json).ok()
    }
}

fn mtime_secs(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}
