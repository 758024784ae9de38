//! 签名库加载管理器
//! 按分片依次尝试远程源、本地源，合并后编译并写入内存缓存

use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::SignatureCache;
use super::model::RawSignatureMap;
use super::source::{partition_file_name, partition_keys, LocalSource, PartitionSource, RemoteSource};
use crate::compiler::{SignatureCompiler, SignatureMap};
use crate::config::GlobalConfig;
use crate::error::{TracerResult, TracerError};

/// 签名库存储
pub struct SignatureStore {
    // 按优先级排列的数据源
    sources: Vec<Arc<dyn PartitionSource>>,
    cache: Arc<SignatureCache>,
}

impl SignatureStore {
    /// 指定数据源顺序创建
    pub fn new(sources: Vec<Arc<dyn PartitionSource>>) -> Self {
        Self {
            sources,
            cache: Arc::new(SignatureCache::new()),
        }
    }

    /// 按全局配置创建：远程源（离线模式下省略） + 本地源
    pub fn from_config(config: &GlobalConfig) -> TracerResult<Self> {
        let mut sources: Vec<Arc<dyn PartitionSource>> = Vec::new();
        if !config.offline {
            sources.push(Arc::new(RemoteSource::from_config(config)?));
        }
        sources.push(Arc::new(LocalSource::new(config.local_db_dir.clone())));
        Ok(Self::new(sources))
    }

    /// 使用外部注入的缓存（多个存储共享或测试中替换）
    pub fn with_cache(mut self, cache: Arc<SignatureCache>) -> Self {
        self.cache = cache;
        self
    }

    /// 由已合并的原始签名库直接构建（快照等场景），缓存预先填充
    pub async fn preloaded(raw: &RawSignatureMap) -> Self {
        let store = Self::new(Vec::new());
        store.cache.put(SignatureCompiler::compile(raw)).await;
        store
    }

    pub fn cache(&self) -> &Arc<SignatureCache> {
        &self.cache
    }

    /// 加载签名库（命中缓存直接返回）
    pub async fn load(&self) -> Arc<SignatureMap> {
        self.cache
            .get_or_load(|| async {
                let raw = self.fetch_partitions().await;
                SignatureCompiler::compile(&raw)
            })
            .await
    }

    /// 失效缓存并重新加载
    pub async fn reload(&self) -> Arc<SignatureMap> {
        self.cache.invalidate().await;
        self.load().await
    }

    /// 拉取并合并全部分片（不经过缓存）；单个分片失败只记录日志
    pub async fn fetch_partitions(&self) -> RawSignatureMap {
        let mut merged = RawSignatureMap::new();
        let mut obtained = 0usize;

        for key in partition_keys() {
            let file_name = partition_file_name(key);
            let Some(partition) = self.fetch_partition(&file_name).await else {
                warn!("分片 {} 所有数据源均不可用，已跳过", file_name);
                continue;
            };
            obtained += 1;

            for (name, signature) in partition {
                if merged.contains_key(&name) {
                    debug!("技术 {} 在分片 {} 中重复出现，保留先加载的定义", name, file_name);
                    continue;
                }
                merged.insert(name, signature);
            }
        }

        if obtained == 0 {
            warn!("未获取到任何签名分片，检测结果将为空");
        }
        debug!("签名分片合并完成，成功分片数：{}，技术总数：{}", obtained, merged.len());
        merged
    }

    /// 按数据源顺序获取单个分片，解析失败视为该数据源失败
    async fn fetch_partition(&self, file_name: &str) -> Option<RawSignatureMap> {
        for source in &self.sources {
            let result = source
                .fetch(file_name)
                .await
                .and_then(|body| Self::parse_partition(&body));

            match result {
                Ok(partition) => {
                    debug!("[{}] 分片 {} 加载成功，技术数：{}", source.name(), file_name, partition.len());
                    return Some(partition);
                }
                Err(e) => warn!("[{}] 分片 {} 加载失败：{}", source.name(), file_name, e),
            }
        }
        None
    }

    fn parse_partition(body: &str) -> TracerResult<RawSignatureMap> {
        serde_json::from_str(body).map_err(|e| TracerError::SignatureParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 内存分片源：文件名 -> JSON 文本，缺失返回错误
    struct StubSource {
        name: &'static str,
        files: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(name: &'static str, files: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                name,
                files: files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PartitionSource for StubSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, file_name: &str) -> TracerResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(file_name)
                .cloned()
                .ok_or_else(|| TracerError::PartitionUnavailable(file_name.to_string()))
        }
    }

    #[tokio::test]
    async fn test_remote_preferred_with_local_fallback() {
        let remote = StubSource::new("remote", &[("w.json", r#"{"WordPress": {"cats": [1]}}"#)]);
        let local = StubSource::new("local", &[
            ("w.json", r#"{"WordPress": {"cats": [99]}}"#),
            ("r.json", r#"{"React": {"cats": [12]}}"#),
        ]);
        let store = SignatureStore::new(vec![remote.clone(), local.clone()]);

        let signatures = store.load().await;
        assert_eq!(signatures.len(), 2);
        assert_eq!(signatures.categories_of("WordPress"), vec!["1".to_string()]);
        assert_eq!(signatures.categories_of("React"), vec!["12".to_string()]);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 27);
    }

    #[tokio::test]
    async fn test_malformed_remote_partition_falls_back() {
        let remote = StubSource::new("remote", &[("j.json", "{not json")]);
        let local = StubSource::new("local", &[("j.json", r#"{"jQuery": {"cats": [59]}}"#)]);
        let store = SignatureStore::new(vec![remote, local]);

        let signatures = store.load().await;
        assert!(signatures.contains("jQuery"));
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_empty_map() {
        let store = SignatureStore::new(vec![
            StubSource::new("remote", &[]),
            StubSource::new("local", &[]),
        ]);

        let signatures = store.load().await;
        assert!(signatures.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_keep_first_partition() {
        let local = StubSource::new("local", &[
            ("_.json", r#"{"Shared": {"cats": [1]}}"#),
            ("s.json", r#"{"Shared": {"cats": [2]}, "Svelte": {}}"#),
        ]);
        let store = SignatureStore::new(vec![local]);

        let signatures = store.load().await;
        assert_eq!(signatures.categories_of("Shared"), vec!["1".to_string()]);
        assert!(signatures.contains("Svelte"));
    }

    #[tokio::test]
    async fn test_cached_until_reload() {
        let local = StubSource::new("local", &[("a.json", r#"{"Angular": {}}"#)]);
        let store = SignatureStore::new(vec![local.clone()]);

        store.load().await;
        store.load().await;
        assert_eq!(local.calls.load(Ordering::SeqCst), 27);

        store.reload().await;
        assert_eq!(local.calls.load(Ordering::SeqCst), 54);
    }

    #[tokio::test]
    async fn test_shared_cache_and_preloaded_store() {
        let cache = Arc::new(SignatureCache::new());
        let local = StubSource::new("local", &[("a.json", r#"{"Angular": {}}"#)]);
        let first = SignatureStore::new(vec![local.clone()]).with_cache(cache.clone());
        let second = SignatureStore::new(vec![local.clone()]).with_cache(cache);

        first.load().await;
        assert!(second.load().await.contains("Angular"));
        assert_eq!(local.calls.load(Ordering::SeqCst), 27);

        let raw: RawSignatureMap = serde_json::from_str(r#"{"Vue.js": {"cats": [12]}}"#).unwrap();
        let preloaded = SignatureStore::preloaded(&raw).await;
        assert!(preloaded.load().await.contains("Vue.js"));
    }
}
