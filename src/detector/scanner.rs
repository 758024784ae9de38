//! 技术扫描服务：串联签名库加载、页面信号采集、检测与分类整理
//! 对外只返回 `ScanResponse`，任何失败都转成 `{error}` 结构

use std::sync::Arc;
use tracing::{debug, error};

use super::detector::TechDetector;
use super::organizer::CategoryOrganizer;
use crate::config::GlobalConfig;
use crate::error::TracerResult;
use crate::probe::{PageProbe, PageSignals};
use crate::rule::{CategoryTable, ScanReport, ScanResponse, SignatureStore};

/// 没有可探测页面时的错误信息
pub const NO_ACTIVE_WEB_VIEW: &str = "No active web view";

/// 技术扫描服务
pub struct TechnologyService {
    store: Arc<SignatureStore>,
    categories: Arc<CategoryTable>,
}

impl TechnologyService {
    pub fn new(store: Arc<SignatureStore>, categories: Arc<CategoryTable>) -> Self {
        Self { store, categories }
    }

    /// 按全局配置组装签名库存储与分类表
    pub fn from_config(config: &GlobalConfig) -> TracerResult<Self> {
        let store = SignatureStore::from_config(config)?;
        let categories = CategoryTable::load(&config.categories_path);
        Ok(Self::new(Arc::new(store), Arc::new(categories)))
    }

    pub fn store(&self) -> &Arc<SignatureStore> {
        &self.store
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// 扫描当前页面
    pub async fn scan(&self, probe: Option<&dyn PageProbe>) -> ScanResponse {
        let Some(probe) = probe else {
            return ScanResponse::error(NO_ACTIVE_WEB_VIEW);
        };

        match self.scan_page(probe).await {
            Ok(report) => ScanResponse::Completed(report),
            Err(e) => {
                error!("技术扫描失败：{}", e);
                ScanResponse::error(e.to_string())
            }
        }
    }

    /// 扫描指定页面，失败时返回错误
    pub async fn scan_page(&self, probe: &dyn PageProbe) -> TracerResult<ScanReport> {
        let signatures = self.store.load().await;
        let signals = PageSignals::collect(probe).await?;
        debug!("页面信号采集完成：{}", signals.url);

        let detector = TechDetector::new(Arc::clone(&signatures));
        let detections = detector.detect(&signals, probe).await;
        let technologies = CategoryOrganizer::organize(&detections, &signatures, &self.categories);

        Ok(ScanReport {
            url: signals.url,
            domain: signals.domain,
            technologies,
        })
    }
}
