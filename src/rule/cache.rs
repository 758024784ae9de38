//! 签名缓存管理
//! 内存缓存：进程内共享的已编译签名库，可显式失效
//! 快照缓存：合并后的原始签名库落盘为 MessagePack，供离线扫描使用

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::model::RawSignatureMap;
use crate::compiler::SignatureMap;
use crate::error::{TracerResult, TracerError};

/// 已编译签名库的内存缓存
/// 首次加载时持锁，并发的首批扫描只会触发一次加载
#[derive(Debug, Default)]
pub struct SignatureCache {
    slot: Mutex<Option<Arc<SignatureMap>>>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 命中则直接返回，否则执行加载并填充
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Arc<SignatureMap>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SignatureMap>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            return Arc::clone(cached);
        }

        let loaded = Arc::new(load().await);
        *slot = Some(Arc::clone(&loaded));
        loaded
    }

    pub async fn get(&self) -> Option<Arc<SignatureMap>> {
        self.slot.lock().await.clone()
    }

    pub async fn put(&self, signatures: SignatureMap) -> Arc<SignatureMap> {
        let signatures = Arc::new(signatures);
        *self.slot.lock().await = Some(Arc::clone(&signatures));
        signatures
    }

    /// 清空缓存，下次访问重新加载
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            debug!("签名库内存缓存已失效");
        }
    }

    pub async fn is_populated(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// 快照缓存管理器
pub struct SnapshotCache;

impl SnapshotCache {
    /// 从快照文件加载原始签名库
    pub async fn load(path: &Path) -> TracerResult<RawSignatureMap> {
        let data = tokio::fs::read(path).await?;

        // MessagePack反序列化
        let signatures: RawSignatureMap = rmp_serde::from_slice(&data)
            .map_err(|e| TracerError::SnapshotError(format!("反序列化失败：{}", e)))?;

        debug!("快照反序列化成功，技术签名数：{}", signatures.len());
        Ok(signatures)
    }

    /// 将原始签名库写入快照文件
    pub async fn save(path: &Path, signatures: &RawSignatureMap) -> TracerResult<()> {
        // MessagePack序列化（命名字段，兼容可选字段的跳过序列化）
        let data = rmp_serde::to_vec_named(signatures)
            .map_err(|e| TracerError::SnapshotError(format!("序列化失败：{}", e)))?;

        debug!("签名库序列化成功，序列化后数据大小：{} 字节", data.len());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    /// 删除快照文件
    pub async fn clear(path: &Path) -> TracerResult<()> {
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}
