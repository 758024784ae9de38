//! 签名编译器核心
//! 将原始签名编译为可执行的模式规则，无效规则仅跳过该条

use std::collections::BTreeMap;
use std::time::Instant;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use super::pattern::{
    CompileStats, CompiledSignature, DomRule, KeyedRules, PatternRule, RegexRule, SignatureMap,
};
use crate::error::TracerResult;
use crate::rule::{RawSignature, RawSignatureMap};

/// 规则内嵌指令分隔符（JSON 中写作 `\\;`）
const DIRECTIVE_SEPARATOR: &str = "\\;";

/// 签名编译器
pub struct SignatureCompiler;

impl SignatureCompiler {
    /// 编译签名库
    pub fn compile(raw: &RawSignatureMap) -> SignatureMap {
        let start = Instant::now();
        let mut stats = CompileStats::default();
        let mut signatures = BTreeMap::new();

        for (name, raw_sig) in raw {
            let compiled = Self::compile_signature(name, raw_sig, &mut stats);
            signatures.insert(name.clone(), compiled);
        }
        stats.signatures = signatures.len();

        debug!("✅ 签名编译完成，总耗时{:?}", start.elapsed());
        debug!(
            "📊 编译统计：技术{}个、规则{}条、无效规则{}条",
            stats.signatures, stats.rules, stats.invalid_rules
        );

        SignatureMap::new(signatures, stats)
    }

    /// 编译单个技术签名
    pub fn compile_signature(name: &str, raw: &RawSignature, stats: &mut CompileStats) -> CompiledSignature {
        CompiledSignature {
            name: name.to_string(),
            html: Self::compile_pattern_list(raw.html.as_ref(), stats),
            meta: Self::compile_keyed_patterns(raw.meta.as_ref(), stats, |k| k.to_string()),
            script_src: Self::compile_pattern_list(raw.script_src.as_ref(), stats),
            headers: Self::compile_keyed_patterns(raw.headers.as_ref(), stats, |k| k.to_lowercase()),
            js: Self::compile_js_patterns(raw.js.as_ref(), stats),
            cookies: Self::compile_keyed_patterns(raw.cookies.as_ref(), stats, |k| k.to_string()),
            dom: Self::compile_dom_rules(raw.dom.as_ref(), stats),
            url: Self::compile_pattern_list(raw.url.as_ref(), stats),
            css: Self::compile_pattern_list(raw.css.as_ref(), stats),
            robots: Self::compile_pattern_list(raw.robots.as_ref(), stats),
            category_ids: raw.category_ids.clone(),
            icon: raw.icon.clone(),
            requires: Self::relation_names(raw.requires.as_ref()),
            implies: Self::relation_names(raw.implies.as_ref()),
        }
    }

    /// 编译列表型模式（字符串或字符串数组）
    fn compile_pattern_list(value: Option<&Value>, stats: &mut CompileStats) -> Vec<PatternRule> {
        let Some(value) = value else {
            return Vec::new();
        };

        let mut rules = Vec::new();
        match value {
            Value::String(s) => Self::push_compiled(s, &mut rules, stats),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(s) => Self::push_compiled(s, &mut rules, stats),
                        _ => Self::record_invalid(stats),
                    }
                }
            }
            _ => Self::record_invalid(stats),
        }
        rules
    }

    /// 编译键值对型模式（meta/headers/cookies）
    fn compile_keyed_patterns<F>(value: Option<&Value>, stats: &mut CompileStats, normalize_key: F) -> Vec<KeyedRules>
    where
        F: Fn(&str) -> String,
    {
        let Some(value) = value else {
            return Vec::new();
        };
        let Value::Object(entries) = value else {
            Self::record_invalid(stats);
            return Vec::new();
        };

        entries
            .iter()
            .map(|(key, val)| KeyedRules {
                key: normalize_key(key),
                rules: Self::compile_pattern_list(Some(val), stats),
            })
            .filter(|keyed| !keyed.rules.is_empty())
            .collect()
    }

    /// 编译 js 规则：字符串为正则，`true` 为存在性规则
    fn compile_js_patterns(value: Option<&Value>, stats: &mut CompileStats) -> Vec<(String, PatternRule)> {
        let Some(value) = value else {
            return Vec::new();
        };
        let Value::Object(entries) = value else {
            Self::record_invalid(stats);
            return Vec::new();
        };

        let mut rules = Vec::new();
        for (var_name, pattern) in entries {
            match pattern {
                Value::String(s) => match Self::compile_rule(s) {
                    Ok(rule) => {
                        stats.rules += 1;
                        rules.push((var_name.clone(), rule));
                    }
                    Err(e) => {
                        debug!("js规则 {} 编译失败，已跳过：{}", var_name, e);
                        Self::record_invalid(stats);
                    }
                },
                Value::Bool(true) => {
                    stats.rules += 1;
                    rules.push((var_name.clone(), PatternRule::PresenceOnly));
                }
                _ => Self::record_invalid(stats),
            }
        }
        rules
    }

    /// 编译 DOM 规则：字符串 / 数组 / 以选择器为键的对象
    fn compile_dom_rules(value: Option<&Value>, stats: &mut CompileStats) -> Vec<DomRule> {
        let Some(value) = value else {
            return Vec::new();
        };

        let mut selectors: Vec<&str> = Vec::new();
        match value {
            Value::String(s) => selectors.extend(s.split(',')),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(s) => selectors.extend(s.split(',')),
                        _ => Self::record_invalid(stats),
                    }
                }
            }
            Value::Object(entries) => {
                for (selector, detail) in entries {
                    match detail {
                        Value::String(_) | Value::Bool(true) | Value::Object(_) => selectors.extend(selector.split(',')),
                        _ => Self::record_invalid(stats),
                    }
                }
            }
            _ => Self::record_invalid(stats),
        }

        selectors
            .into_iter()
            .filter_map(|selector| {
                let tag = dom_tag_name(selector);
                if tag.is_empty() {
                    return None;
                }
                stats.rules += 1;
                Some(DomRule { selector: selector.trim().to_string(), tag })
            })
            .collect()
    }

    fn push_compiled(raw: &str, rules: &mut Vec<PatternRule>, stats: &mut CompileStats) {
        match Self::compile_rule(raw) {
            Ok(rule) => {
                stats.rules += 1;
                rules.push(rule);
            }
            Err(e) => {
                debug!("规则编译失败，已跳过：{}，错误：{}", raw, e);
                Self::record_invalid(stats);
            }
        }
    }

    fn record_invalid(stats: &mut CompileStats) {
        stats.invalid_rules += 1;
    }

    /// 解析 `pattern\;version:N` 并编译为忽略大小写的正则
    pub fn compile_rule(raw: &str) -> TracerResult<PatternRule> {
        let (pattern, version_group) = split_directives(raw);
        let regex = compile_case_insensitive(pattern)?;
        Ok(PatternRule::Regex(RegexRule { regex, version_group }))
    }

    /// 解析关联技术名（字符串或数组），去掉 `\;confidence:N` 等后缀
    fn relation_names(value: Option<&Value>) -> Vec<String> {
        let mut names = Vec::new();
        let mut push = |s: &str| {
            let name = s.split(DIRECTIVE_SEPARATOR).next().unwrap_or("").trim();
            if !name.is_empty() && !names.iter().any(|n: &String| n == name) {
                names.push(name.to_string());
            }
        };

        match value {
            Some(Value::String(s)) => push(s),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(s) = item {
                        push(s);
                    }
                }
            }
            _ => {}
        }
        names
    }
}

/// 拆出正则主体与版本分组；缺省、0 或非数字时取 1
pub fn split_directives(raw: &str) -> (&str, usize) {
    let mut parts = raw.split(DIRECTIVE_SEPARATOR);
    let pattern = parts.next().unwrap_or("");
    let mut version_group = 1;

    for directive in parts {
        if let Some(value) = directive.strip_prefix("version:") {
            let digits: String = value
                .trim_start_matches('\\')
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            version_group = digits.parse::<usize>().ok().filter(|n| *n > 0).unwrap_or(1);
        }
    }

    (pattern, version_group)
}

/// 忽略大小写编译；含 JS 环视语法且编译失败时，去掉环视分组再试一次
fn compile_case_insensitive(pattern: &str) -> TracerResult<Regex> {
    static LOOK_AROUND_REGEX: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\(\?<?[=!][^()]*\)").unwrap()
    });

    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Ok(regex),
        Err(e) if LOOK_AROUND_REGEX.is_match(pattern) => {
            let stripped = LOOK_AROUND_REGEX.replace_all(pattern, "");
            debug!("正则 {} 含环视语法，去除后重试", pattern);
            RegexBuilder::new(&stripped)
                .case_insensitive(true)
                .build()
                .map_err(|_| e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// 选择器归约为标签名：取首个 `.` `#` `[` `:` `>` 或空白之前的部分
fn dom_tag_name(selector: &str) -> String {
    selector
        .trim()
        .split(|c: char| matches!(c, '.' | '#' | '[' | ':' | '>') || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_lowercase()
}
