//! Header格式转换工具
//! HeaderMap 到探测信号所需格式的转换（小写名、单值、cookie 拆分）

use std::collections::HashMap;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::warn;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为HashMap<String, Vec<String>>，键统一小写
    pub fn to_hashmap(header_map: &HeaderMap) -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        let mut iter_count = 0;

        for (key, value) in header_map.iter() {
            iter_count += 1;
            if iter_count > 1000 {
                warn!("Header迭代超过1000次，强制终止");
                break;
            }

            let key_str = key.as_str().to_lowercase();
            let value_str = value.to_str().unwrap_or("").to_string();

            map.entry(key_str)
                .or_insert_with(Vec::new)
                .push(value_str);
        }

        map
    }

    /// 将HashMap<String, Vec<String>>转换为单值HashMap<String, String>（取首个非空值）
    pub fn to_single_value(hashmap: &HashMap<String, Vec<String>>) -> HashMap<String, String> {
        let mut single_map = HashMap::new();
        for (key, values) in hashmap {
            if let Some(first_val) = values.iter().find(|v| !v.is_empty()) {
                single_map.insert(key.clone(), first_val.clone());
            }
        }
        single_map
    }

    /// 从 Set-Cookie 头解析 cookie 名值对（同名取最后一次）
    pub fn to_cookies(header_map: &HeaderMap) -> HashMap<String, String> {
        let mut cookies = HashMap::new();
        for value in header_map.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            let pair = raw.split(';').next().unwrap_or("").trim();
            let (name, val) = pair.split_once('=').unwrap_or((pair, ""));
            let name = name.trim();
            if !name.is_empty() {
                cookies.insert(name.to_string(), val.trim().to_string());
            }
        }
        cookies
    }
}
