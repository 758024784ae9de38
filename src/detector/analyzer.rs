//! 检测分析器：每类信号一个分析器，按 `EvalState` 逐步折叠
//! 各分析器只读签名与信号快照，js 分析器额外通过求值器读取嵌套变量

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::compiler::{CompiledSignature, PatternRule, RuleMatch};
use crate::probe::{ExpressionEvaluator, PageSignals};

/// 单个技术的求值状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalState {
    pub matched: bool,
    pub version: Option<String>,
}

impl EvalState {
    /// 已命中且已取得版本，后续分类无需再查
    pub fn is_settled(&self) -> bool {
        self.matched && self.version.is_some()
    }

    /// 合并一次规则求值；新的非空版本覆盖旧版本
    pub fn absorb(self, hit: Option<RuleMatch>) -> Self {
        match hit {
            Some(hit) => EvalState {
                matched: true,
                version: hit.version.or(self.version),
            },
            None => self,
        }
    }

    /// 按声明顺序对同一输入依次应用多条规则
    pub fn apply_rules(self, rules: &[PatternRule], subject: &str) -> Self {
        rules.iter().fold(self, |state, rule| state.absorb(rule.evaluate(subject)))
    }
}

/// 同步分析器签名
pub type Stage = fn(EvalState, &CompiledSignature, &PageSignals) -> EvalState;

/// HTML分析器
pub struct HtmlAnalyzer;

impl HtmlAnalyzer {
    pub fn analyze(state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        state.apply_rules(&sig.html, &signals.html)
    }
}

/// Meta分析器
pub struct MetaAnalyzer;

impl MetaAnalyzer {
    /// 某个 meta 标签命中后不再看后续标签
    pub fn analyze(mut state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        if sig.meta.is_empty() {
            return state;
        }

        for tag in &signals.meta {
            let (Some(name), Some(content)) = (tag.name.as_deref(), tag.content.as_deref()) else {
                continue;
            };
            if name.is_empty() || content.is_empty() {
                continue;
            }

            let mut tag_matched = false;
            for keyed in sig.meta.iter().filter(|k| k.key.eq_ignore_ascii_case(name)) {
                for rule in &keyed.rules {
                    let hit = rule.evaluate(content);
                    tag_matched |= hit.is_some();
                    state = state.absorb(hit);
                }
            }
            if tag_matched {
                break;
            }
        }
        state
    }
}

/// Script分析器
pub struct ScriptAnalyzer;

impl ScriptAnalyzer {
    /// 取得版本后不再看后续脚本
    pub fn analyze(mut state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        if sig.script_src.is_empty() {
            return state;
        }

        for src in signals.scripts.iter().filter(|s| !s.is_empty()) {
            state = state.apply_rules(&sig.script_src, src);
            if state.version.is_some() {
                break;
            }
        }
        state
    }
}

/// Header分析器
pub struct HeaderAnalyzer;

impl HeaderAnalyzer {
    /// 某个 Header 命中后不再看后续 Header
    pub fn analyze(mut state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        for keyed in &sig.headers {
            let Some(value) = signals.headers.get(&keyed.key).filter(|v| !v.is_empty()) else {
                continue;
            };

            let mut header_matched = false;
            for rule in &keyed.rules {
                let hit = rule.evaluate(value);
                header_matched |= hit.is_some();
                state = state.absorb(hit);
            }
            if header_matched {
                break;
            }
        }
        state
    }
}

/// JS变量分析器
pub struct JsAnalyzer;

/// 嵌套路径中不允许出现的字符
const JS_PATH_BLACKLIST: [char; 16] = [
    ':', '/', '?', '#', '=', '&', '|', '!', '*', '\'', '"', ',', ' ', '\n', '\r', '\t',
];

impl JsAnalyzer {
    /// 嵌套路径实时求值，扁平变量查预采集的 jsVars；取得版本后不再看后续变量
    pub async fn analyze<E: ExpressionEvaluator + ?Sized>(
        mut state: EvalState,
        sig: &CompiledSignature,
        signals: &PageSignals,
        evaluator: &E,
    ) -> EvalState {
        for (var_name, rule) in &sig.js {
            let value = if is_evaluable_path(var_name) {
                match evaluator.evaluate_expression(var_name).await {
                    Ok(Some(value)) if !value.is_null() => Some(js_value_text(&value)),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("技术 {} 的 js 表达式 {} 求值失败，按无值处理：{}", sig.name, var_name, e);
                        None
                    }
                }
            } else {
                signals.js_vars.get(var_name).map(js_value_text)
            };

            if let Some(text) = value {
                state = state.absorb(rule.evaluate(&text));
            }
            if state.version.is_some() {
                break;
            }
        }
        state
    }
}

/// 是否为需要实时求值的嵌套属性路径：含 `.`、无数字段、无黑名单字符
pub fn is_evaluable_path(var_name: &str) -> bool {
    static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\d").unwrap());

    var_name.contains('.')
        && !NUMERIC_SEGMENT.is_match(var_name)
        && !var_name.contains(JS_PATH_BLACKLIST)
}

/// JS 值的字符串形式，与页面内 `String(value)` 一致
fn js_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        // 数组元素以逗号连接，null 元素记为空串
        Value::Array(items) => items
            .iter()
            .map(|item| if item.is_null() { String::new() } else { js_value_text(item) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Cookie分析器
pub struct CookieAnalyzer;

impl CookieAnalyzer {
    /// 取得版本后不再看后续 Cookie
    pub fn analyze(mut state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        for keyed in &sig.cookies {
            let Some(value) = signals.cookies.get(&keyed.key).filter(|v| !v.is_empty()) else {
                continue;
            };
            state = state.apply_rules(&keyed.rules, value);
            if state.version.is_some() {
                break;
            }
        }
        state
    }
}

/// DOM分析器
pub struct DomAnalyzer;

impl DomAnalyzer {
    /// 仅有标签频次表可用，标签存在即视为命中，不产出版本
    pub fn analyze(mut state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        for rule in &sig.dom {
            if signals.dom.get(&rule.tag).copied().unwrap_or(0) > 0 {
                debug!("技术 {} 的 DOM 选择器 {} 按标签 {} 命中", sig.name, rule.selector, rule.tag);
                state = state.absorb(PatternRule::PresenceOnly.evaluate(&rule.tag));
            }
        }
        state
    }
}

/// URL分析器
pub struct UrlAnalyzer;

impl UrlAnalyzer {
    pub fn analyze(state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        if signals.url.is_empty() {
            return state;
        }
        state.apply_rules(&sig.url, &signals.url)
    }
}

/// CSS分析器
pub struct CssAnalyzer;

impl CssAnalyzer {
    /// 取得版本后不再看后续样式表
    pub fn analyze(mut state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        if sig.css.is_empty() {
            return state;
        }

        for href in &signals.css {
            state = state.apply_rules(&sig.css, href);
            if state.version.is_some() {
                break;
            }
        }
        state
    }
}

/// robots.txt分析器
pub struct RobotsAnalyzer;

impl RobotsAnalyzer {
    pub fn analyze(state: EvalState, sig: &CompiledSignature, signals: &PageSignals) -> EvalState {
        if signals.robots_txt.is_empty() {
            return state;
        }
        state.apply_rules(&sig.robots, &signals.robots_txt)
    }
}
