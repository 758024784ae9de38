//! 签名数据模型定义
//! 仅存储签名与检测结果数据，无任何业务逻辑，支持序列化/反序列化

use std::collections::BTreeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::ser::SerializeMap;
use serde_json::Value;

/// 合并后的原始签名库（技术名 -> 签名），按名称有序
pub type RawSignatureMap = BTreeMap<String, RawSignature>;

/// 技术签名定义（从分片 JSON 解析）
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RawSignature {
    #[serde(rename = "cats", default, deserialize_with = "de_category_ids")]
    pub category_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // 检测规则
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(rename = "scriptSrc", default, skip_serializing_if = "Option::is_none")]
    pub script_src: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robots: Option<Value>,

    // 关联规则
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implies: Option<Value>,
}

/// 分类 ID 兼容数字与字符串两种写法，统一存为字符串
fn de_category_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let ids = match value {
        Some(Value::Array(items)) => items.iter().filter_map(category_id_text).collect(),
        Some(single) => category_id_text(&single).into_iter().collect(),
        None => Vec::new(),
    };
    Ok(ids)
}

fn category_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 分类定义（categories.json 中仅消费 name）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryRule {
    #[serde(default)]
    pub name: String,
}

/// 单条检测结果（匹配阶段累积）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub version: Option<String>,
    pub categories: Vec<String>,
}

impl Detection {
    pub fn new(name: String, version: Option<String>, categories: Vec<String>) -> Self {
        Self { name, version, categories }
    }
}

/// 分类下的技术条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyEntry {
    pub name: String,
    pub version: Option<String>,
    pub icon: Option<String>,
}

/// 按分类整理后的检测结果，保持分类首次出现的顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedTechnologies {
    groups: Vec<(String, Vec<TechnologyEntry>)>,
}

impl CategorizedTechnologies {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加条目；同一分类下按技术名去重，先到先得
    pub fn push(&mut self, category: &str, entry: TechnologyEntry) {
        let idx = match self.groups.iter().position(|(name, _)| name == category) {
            Some(idx) => idx,
            None => {
                self.groups.push((category.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };

        let entries = &mut self.groups[idx].1;
        if !entries.iter().any(|e| e.name == entry.name) {
            entries.push(entry);
        }
    }

    pub fn get(&self, category: &str) -> Option<&[TechnologyEntry]> {
        self.groups
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TechnologyEntry])> {
        self.groups.iter().map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.groups.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Serialize for CategorizedTechnologies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (name, entries) in &self.groups {
            map.serialize_entry(name, entries)?;
        }
        map.end()
    }
}

/// 扫描成功时的报告
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub url: String,
    pub domain: String,
    pub technologies: CategorizedTechnologies,
}

/// 扫描响应：`{error}` 或 `{url, domain, technologies}`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScanResponse {
    Failed { error: String },
    Completed(ScanReport),
}

impl ScanResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ScanResponse::Failed { error: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScanResponse::Failed { .. })
    }
}
