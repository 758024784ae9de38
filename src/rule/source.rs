//! 签名分片数据源
//! 远程源（原始URL + 可选GitHub代理）与本地分发目录两类实现

use std::io::ErrorKind;
use std::path::PathBuf;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::GlobalConfig;
use crate::error::{TracerResult, TracerError};

/// 分片键：`_` 兜底分片在前，随后 a-z
pub fn partition_keys() -> impl Iterator<Item = char> {
    std::iter::once('_').chain('a'..='z')
}

/// 分片文件名
pub fn partition_file_name(key: char) -> String {
    format!("{}.json", key)
}

/// 分片数据源：按文件名返回分片的原始 JSON 文本
#[async_trait]
pub trait PartitionSource: Send + Sync {
    /// 数据源名称（用于日志输出）
    fn name(&self) -> &str;

    /// 拉取单个分片
    async fn fetch(&self, file_name: &str) -> TracerResult<String>;
}

/// 远程分片源
pub struct RemoteSource {
    client: Client,
    base_url: String,
    gh_proxy_url: Option<String>,
    scratch_dir: Option<PathBuf>,
}

impl RemoteSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            gh_proxy_url: None,
            scratch_dir: None,
        }
    }

    /// 按全局配置构建（超时、代理、落盘目录）
    pub fn from_config(config: &GlobalConfig) -> TracerResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.remote_base_url.clone(),
            gh_proxy_url: config.gh_proxy_url.clone(),
            scratch_dir: Some(config.scratch_dir.clone()),
        })
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.gh_proxy_url = proxy;
        self
    }

    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// 单个URL下载
    async fn download(&self, url: &str) -> TracerResult<String> {
        let response = self.client.get(url)
            .header("User-Agent", "TechTracer/0.1.0")
            .header("Accept-Encoding", "gzip, deflate")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TracerError::PartitionUnavailable(format!(
                "URL {} 返回状态码 {}",
                url, response.status()
            )));
        }

        Ok(response.text().await?)
    }

    /// 下载成功的分片落盘，失败只记录日志
    async fn persist(&self, file_name: &str, body: &str) {
        let Some(dir) = &self.scratch_dir else {
            return;
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("创建分片落盘目录 {} 失败：{}", dir.display(), e);
            return;
        }
        let path = dir.join(file_name);
        match tokio::fs::write(&path, body).await {
            Ok(()) => debug!("分片 {} 已写入 {}", file_name, path.display()),
            Err(e) => warn!("分片 {} 写入 {} 失败：{}", file_name, path.display(), e),
        }
    }
}

#[async_trait]
impl PartitionSource for RemoteSource {
    fn name(&self) -> &str {
        "remote"
    }

    async fn fetch(&self, file_name: &str) -> TracerResult<String> {
        let original_url = format!("{}{}", self.base_url, file_name);
        debug!("从远程源下载分片 {}，URL：{}", file_name, original_url);

        let body = match self.download(&original_url).await {
            Ok(body) => body,
            Err(e) => {
                // 先尝试原始URL，失败则尝试代理URL
                let Some(proxy) = &self.gh_proxy_url else {
                    return Err(e);
                };
                let proxy_path = original_url.trim_start_matches("https://");
                let fallback_url = format!("{}{}", proxy, proxy_path);
                warn!("分片 {} 原始URL失败：{}，尝试代理URL：{}", file_name, e, fallback_url);
                self.download(&fallback_url).await?
            }
        };

        self.persist(file_name, &body).await;
        Ok(body)
    }
}

/// 本地分发目录源
pub struct LocalSource {
    dir: PathBuf,
}

impl LocalSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PartitionSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, file_name: &str) -> TracerResult<String> {
        let path = self.dir.join(file_name);
        debug!("从本地签名库读取分片 {}", path.display());

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TracerError::PartitionUnavailable(format!(
                "本地签名文件 {} 不存在",
                path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
