//! 基于 HTTP 的页面探测实现
//! 一次 GET 取得最终 URL、Header、Cookie 与页面源码，不执行脚本

use std::collections::HashMap;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ExpressionEvaluator, MetaTag, PageProbe};
use crate::config::GlobalConfig;
use crate::error::{TracerError, TracerResult};
use crate::extractor::HtmlExtractor;
use crate::utils::HeaderConverter;

/// HTTP 页面探测
#[derive(Debug, Clone)]
pub struct HttpPageProbe {
    client: Client,
    final_url: Url,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    html: String,
    meta: Vec<MetaTag>,
    scripts: Vec<String>,
    css: Vec<String>,
    dom: HashMap<String, u64>,
}

impl HttpPageProbe {
    /// 按全局配置构建 HTTP 客户端
    pub fn client(config: &GlobalConfig) -> TracerResult<Client> {
        Ok(Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout))
            .build()?)
    }

    /// 抓取页面并提取静态信号
    pub async fn fetch(client: Client, url: &str) -> TracerResult<Self> {
        let response = client.get(url)
            .header("User-Agent", "TechTracer/0.1.0")
            .send()
            .await?;

        let final_url = response.url().clone();
        let header_map = response.headers().clone();
        let headers = HeaderConverter::to_single_value(&HeaderConverter::to_hashmap(&header_map));
        let cookies = HeaderConverter::to_cookies(&header_map);
        let html = response.text().await?;
        debug!("页面抓取完成：{}，源码长度：{}", final_url, html.len());

        let extracted = HtmlExtractor::new().extract(&html);
        let scripts = extracted
            .get_script_srcs()
            .into_iter()
            .map(|src| resolve(&final_url, src))
            .collect();
        let css = extracted
            .get_stylesheets()
            .into_iter()
            .map(|href| resolve(&final_url, href))
            .collect();

        Ok(Self {
            client,
            headers,
            cookies,
            meta: extracted.get_meta_tags(),
            scripts,
            css,
            dom: extracted.get_tag_counts(),
            html,
            final_url,
        })
    }
}

/// 相对地址按页面最终 URL 解析为绝对地址；空串保持为空
fn resolve(base: &Url, reference: String) -> String {
    if reference.is_empty() {
        return reference;
    }
    base.join(&reference)
        .map(|u| u.to_string())
        .unwrap_or(reference)
}

#[async_trait]
impl ExpressionEvaluator for HttpPageProbe {
    async fn evaluate_expression(&self, expression: &str) -> TracerResult<Option<Value>> {
        Err(TracerError::ProbeError(format!("HTTP 探测不支持脚本求值：{}", expression)))
    }
}

#[async_trait]
impl PageProbe for HttpPageProbe {
    fn url(&self) -> TracerResult<String> {
        Ok(self.final_url.to_string())
    }

    async fn html(&self) -> TracerResult<String> {
        Ok(self.html.clone())
    }

    async fn headers(&self) -> TracerResult<HashMap<String, String>> {
        Ok(self.headers.clone())
    }

    async fn meta(&self) -> TracerResult<Vec<MetaTag>> {
        Ok(self.meta.clone())
    }

    async fn scripts(&self) -> TracerResult<Vec<String>> {
        Ok(self.scripts.clone())
    }

    async fn js_vars(&self) -> TracerResult<HashMap<String, Value>> {
        Ok(HashMap::new())
    }

    async fn cookies(&self) -> TracerResult<HashMap<String, String>> {
        Ok(self.cookies.clone())
    }

    async fn dom(&self) -> TracerResult<HashMap<String, u64>> {
        Ok(self.dom.clone())
    }

    async fn css(&self) -> TracerResult<Vec<String>> {
        Ok(self.css.clone())
    }

    /// 非 2xx 或请求失败均视为无 robots.txt
    async fn robots_txt(&self) -> TracerResult<String> {
        let robots_url = self.final_url.join("/robots.txt")?;
        let response = match self.client.get(robots_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("robots.txt 请求失败：{}，{}", robots_url, e);
                return Ok(String::new());
            }
        };

        if !response.status().is_success() {
            return Ok(String::new());
        }
        Ok(response.text().await.unwrap_or_default())
    }
}
