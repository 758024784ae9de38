//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;

/// 默认远程签名库分片目录
pub const DEFAULT_REMOTE_BASE_URL: &str =
    "https://raw.githubusercontent.com/enthec/webappanalyzer/main/src/technologies/";

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 远程分片基础URL（以 / 结尾，后接 `<分片>.json`）
    pub remote_base_url: String,
    // GitHub代理URL（原始URL失败时使用，None表示不走代理）
    pub gh_proxy_url: Option<String>,
    // 随程序分发的本地签名库目录
    pub local_db_dir: PathBuf,
    // 下载分片的落盘目录
    pub scratch_dir: PathBuf,
    // 分类表路径
    pub categories_path: PathBuf,
    // 超时配置（单位：秒）
    pub http_timeout: u64,
    // 离线模式：不访问远程源
    pub offline: bool,
    // 是否启用详细日志
    pub verbose: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            gh_proxy_url: None,
            local_db_dir: PathBuf::from("tech-db"),
            scratch_dir: std::env::temp_dir().join("tech-tracer-tech"),
            categories_path: PathBuf::from("tech-db").join("categories.json"),
            http_timeout: 30,
            offline: false,
            verbose: false,
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    pub fn remote_base_url(mut self, url: String) -> Self {
        // 保证以 / 结尾，便于直接拼接分片文件名
        self.config.remote_base_url = if url.ends_with('/') { url } else { format!("{}/", url) };
        self
    }

    pub fn gh_proxy_url(mut self, url: Option<String>) -> Self {
        self.config.gh_proxy_url = url;
        self
    }

    pub fn local_db_dir(mut self, dir: PathBuf) -> Self {
        self.config.local_db_dir = dir;
        self
    }

    pub fn scratch_dir(mut self, dir: PathBuf) -> Self {
        self.config.scratch_dir = dir;
        self
    }

    pub fn categories_path(mut self, path: PathBuf) -> Self {
        self.config.categories_path = path;
        self
    }

    pub fn http_timeout(mut self, timeout: u64) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.config.offline = offline;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
