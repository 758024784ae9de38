//! 页面探测模块：外部页面探测协作方的契约与一次扫描的信号快照
//! 核心只消费探测结果，不实现页面加载与脚本执行

pub mod http_probe;

use std::collections::HashMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{TracerError, TracerResult};

pub use self::http_probe::HttpPageProbe;

/// meta 标签（name/content 均可能缺失）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl MetaTag {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: Some(content.into()),
        }
    }
}

/// 一次扫描的页面信号快照，扫描结束即丢弃
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSignals {
    pub html: String,
    pub url: String,
    pub domain: String,
    // Header 名统一小写
    pub headers: HashMap<String, String>,
    pub meta: Vec<MetaTag>,
    pub scripts: Vec<String>,
    // 全局变量：原始值，或对象仅记为 true
    pub js_vars: HashMap<String, Value>,
    pub cookies: HashMap<String, String>,
    // 标签名 -> 出现次数
    pub dom: HashMap<String, u64>,
    pub css: Vec<String>,
    pub robots_txt: String,
}

impl PageSignals {
    /// 依次向探测方获取各类信号；URL 无法获取或解析时返回错误，其余信号失败按空值处理
    pub async fn collect<P: PageProbe + ?Sized>(probe: &P) -> TracerResult<Self> {
        let url = probe.url()?;
        let domain = domain_of(&url)?;

        // 顺序探测，后续探测可能依赖前面建立的页面状态
        let html = or_empty("html", probe.html().await);
        let headers = or_empty("headers", probe.headers().await)
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();
        let meta = or_empty("meta", probe.meta().await);
        let scripts = or_empty("scripts", probe.scripts().await);
        let js_vars = or_empty("jsVars", probe.js_vars().await);
        let cookies = or_empty("cookies", probe.cookies().await);
        let dom = or_empty("dom", probe.dom().await);
        let css = or_empty("css", probe.css().await);
        let robots_txt = or_empty("robotsTxt", probe.robots_txt().await);

        Ok(Self {
            html,
            url,
            domain,
            headers,
            meta,
            scripts,
            js_vars,
            cookies,
            dom,
            css,
            robots_txt,
        })
    }
}

/// 从 URL 解析主机名
pub fn domain_of(url: &str) -> TracerResult<String> {
    let parsed = url::Url::parse(url)?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| TracerError::InvalidInput(format!("URL {} 不含主机名", url)))
}

fn or_empty<T: Default>(signal: &str, result: TracerResult<T>) -> T {
    result.unwrap_or_else(|e| {
        debug!("信号 {} 获取失败，按空值处理：{}", signal, e);
        T::default()
    })
}

/// 页面内表达式求值能力（嵌套 js 变量路径的实时读取）
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    /// 返回表达式的值；未定义返回 None，求值异常返回错误
    async fn evaluate_expression(&self, expression: &str) -> TracerResult<Option<Value>>;
}

/// 不具备脚本运行时的求值器，所有表达式均无值
pub struct NoEvaluator;

#[async_trait]
impl ExpressionEvaluator for NoEvaluator {
    async fn evaluate_expression(&self, _expression: &str) -> TracerResult<Option<Value>> {
        Ok(None)
    }
}

/// 页面探测契约：按需提供各类信号的尽力而为快照
#[async_trait]
pub trait PageProbe: ExpressionEvaluator {
    /// 当前页面最终 URL
    fn url(&self) -> TracerResult<String>;

    async fn html(&self) -> TracerResult<String>;
    async fn headers(&self) -> TracerResult<HashMap<String, String>>;
    async fn meta(&self) -> TracerResult<Vec<MetaTag>>;
    async fn scripts(&self) -> TracerResult<Vec<String>>;
    async fn js_vars(&self) -> TracerResult<HashMap<String, Value>>;
    async fn cookies(&self) -> TracerResult<HashMap<String, String>>;
    async fn dom(&self) -> TracerResult<HashMap<String, u64>>;
    async fn css(&self) -> TracerResult<Vec<String>>;
    async fn robots_txt(&self) -> TracerResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 只有 URL 与 HTML 可用、其余探测全部失败的页面
    struct FlakyProbe {
        url: String,
    }

    #[async_trait]
    impl ExpressionEvaluator for FlakyProbe {
        async fn evaluate_expression(&self, _expression: &str) -> TracerResult<Option<Value>> {
            Err(TracerError::ProbeError("boom".into()))
        }
    }

    #[async_trait]
    impl PageProbe for FlakyProbe {
        fn url(&self) -> TracerResult<String> {
            Ok(self.url.clone())
        }
        async fn html(&self) -> TracerResult<String> {
            Ok("<html></html>".into())
        }
        async fn headers(&self) -> TracerResult<HashMap<String, String>> {
            Ok(HashMap::from([("Server".to_string(), "nginx".to_string())]))
        }
        async fn meta(&self) -> TracerResult<Vec<MetaTag>> {
            Err(TracerError::ProbeError("meta".into()))
        }
        async fn scripts(&self) -> TracerResult<Vec<String>> {
            Err(TracerError::ProbeError("scripts".into()))
        }
        async fn js_vars(&self) -> TracerResult<HashMap<String, Value>> {
            Err(TracerError::ProbeError("js".into()))
        }
        async fn cookies(&self) -> TracerResult<HashMap<String, String>> {
            Err(TracerError::ProbeError("cookies".into()))
        }
        async fn dom(&self) -> TracerResult<HashMap<String, u64>> {
            Err(TracerError::ProbeError("dom".into()))
        }
        async fn css(&self) -> TracerResult<Vec<String>> {
            Err(TracerError::ProbeError("css".into()))
        }
        async fn robots_txt(&self) -> TracerResult<String> {
            Err(TracerError::ProbeError("robots".into()))
        }
    }

    #[tokio::test]
    async fn test_collect_degrades_failed_signals_to_empty() {
        let probe = FlakyProbe { url: "https://shop.example.com/cart?id=1".into() };
        let signals = PageSignals::collect(&probe).await.unwrap();

        assert_eq!(signals.domain, "shop.example.com");
        assert_eq!(signals.html, "<html></html>");
        assert_eq!(signals.headers.get("server").map(String::as_str), Some("nginx"));
        assert!(signals.meta.is_empty());
        assert!(signals.robots_txt.is_empty());
    }

    #[tokio::test]
    async fn test_collect_rejects_unparseable_url() {
        let probe = FlakyProbe { url: "not a url".into() };
        assert!(PageSignals::collect(&probe).await.is_err());
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("http://127.0.0.1:8080/x").unwrap(), "127.0.0.1");
        assert!(domain_of("data:text/plain,hi").is_err());
    }
}
