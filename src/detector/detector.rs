//! 检测器核心：按签名依次折叠各类分析器，输出去重后的检测结果
use std::sync::Arc;
use tracing::debug;

use super::analyzer::{
    CookieAnalyzer, CssAnalyzer, DomAnalyzer, EvalState, HeaderAnalyzer, HtmlAnalyzer, JsAnalyzer,
    MetaAnalyzer, RobotsAnalyzer, ScriptAnalyzer, Stage, UrlAnalyzer,
};
use crate::compiler::{CompiledSignature, SignatureMap};
use crate::probe::{ExpressionEvaluator, PageSignals};
use crate::rule::Detection;
use crate::utils::DetectionUpdater;

/// js 之前求值的分类
const LEADING_STAGES: [Stage; 4] = [
    HtmlAnalyzer::analyze,
    MetaAnalyzer::analyze,
    ScriptAnalyzer::analyze,
    HeaderAnalyzer::analyze,
];

/// js 之后求值的分类
const TRAILING_STAGES: [Stage; 5] = [
    CookieAnalyzer::analyze,
    DomAnalyzer::analyze,
    UrlAnalyzer::analyze,
    CssAnalyzer::analyze,
    RobotsAnalyzer::analyze,
];

/// 技术检测器
#[derive(Debug, Clone)]
pub struct TechDetector {
    signatures: Arc<SignatureMap>,
}

impl TechDetector {
    pub fn new(signatures: Arc<SignatureMap>) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &SignatureMap {
        &self.signatures
    }

    /// 对一次信号快照执行检测
    /// 按技术名顺序遍历签名库；命中后记录结果并展开一层 requires/implies
    pub async fn detect<E: ExpressionEvaluator + ?Sized>(
        &self,
        signals: &PageSignals,
        evaluator: &E,
    ) -> Vec<Detection> {
        let mut detected = Vec::new();

        for (name, signature) in self.signatures.iter() {
            let state = Self::evaluate(signature, signals, evaluator).await;
            if !state.matched {
                continue;
            }

            debug!("检测到技术：{}，版本：{:?}", name, state.version);
            DetectionUpdater::update(&mut detected, name, state.version, &signature.category_ids);
            DetectionUpdater::apply_relations(signature, &self.signatures, &mut detected);
        }

        debug!("检测完成，共 {} 项技术", detected.len());
        detected
    }

    /// 按固定分类顺序求值单个签名；命中且取得版本后跳过剩余分类
    pub async fn evaluate<E: ExpressionEvaluator + ?Sized>(
        signature: &CompiledSignature,
        signals: &PageSignals,
        evaluator: &E,
    ) -> EvalState {
        let state = Self::run_stages(EvalState::default(), &LEADING_STAGES, signature, signals);
        if state.is_settled() {
            return state;
        }

        let state = JsAnalyzer::analyze(state, signature, signals, evaluator).await;
        if state.is_settled() {
            return state;
        }

        Self::run_stages(state, &TRAILING_STAGES, signature, signals)
    }

    fn run_stages(
        state: EvalState,
        stages: &[Stage],
        signature: &CompiledSignature,
        signals: &PageSignals,
    ) -> EvalState {
        stages.iter().fold(state, |state, stage| {
            if state.is_settled() {
                state
            } else {
                stage(state, signature, signals)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SignatureCompiler;
    use crate::error::{TracerError, TracerResult};
    use crate::probe::{MetaTag, NoEvaluator};
    use crate::rule::RawSignatureMap;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn detector(value: Value) -> TechDetector {
        let raw: RawSignatureMap = serde_json::from_value(value).unwrap();
        TechDetector::new(Arc::new(SignatureCompiler::compile(&raw)))
    }

    /// 记录求值调用的求值器，按表达式返回预设结果
    #[derive(Default)]
    struct RecordingEvaluator {
        values: HashMap<String, TracerResult<Option<Value>>>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingEvaluator {
        fn with(mut self, expression: &str, result: TracerResult<Option<Value>>) -> Self {
            self.values.insert(expression.to_string(), result);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExpressionEvaluator for RecordingEvaluator {
        async fn evaluate_expression(&self, expression: &str) -> TracerResult<Option<Value>> {
            self.calls.lock().unwrap().push(expression.to_string());
            match self.values.get(expression) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(_)) => Err(TracerError::ProbeError(format!("{} is not defined", expression))),
                None => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_wordpress_meta_generator() {
        let detector = detector(json!({
            "WordPress": {"cats": [1], "meta": {"generator": "WordPress ([\\d.]+)\\;version:\\1"}}
        }));
        let signals = PageSignals {
            meta: vec![MetaTag::new("generator", "WordPress 5.9")],
            ..Default::default()
        };

        let detected = detector.detect(&signals, &NoEvaluator).await;
        assert_eq!(
            detected,
            vec![Detection::new("WordPress".into(), Some("5.9".into()), vec!["1".into()])]
        );
    }

    #[tokio::test]
    async fn test_presence_js_with_implied_technology() {
        let detector = detector(json!({
            "React": {"cats": [12], "js": {"React": true}, "implies": "JavaScript"}
        }));
        let mut signals = PageSignals::default();
        signals.js_vars.insert("React".into(), json!(true));

        let detected = detector.detect(&signals, &NoEvaluator).await;
        assert_eq!(
            detected,
            vec![
                Detection::new("React".into(), None, vec!["12".into()]),
                Detection::new("JavaScript".into(), None, vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern_does_not_block_valid_ones() {
        let detector = detector(json!({
            "Broken": {"html": ["([unclosed", "<div id=\"broken-app\""]}
        }));
        let signals = PageSignals { html: "<div id=\"broken-app\"></div>".into(), ..Default::default() };

        let detected = detector.detect(&signals, &NoEvaluator).await;
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].name, "Broken");
    }

    #[tokio::test]
    async fn test_direct_match_fills_version_of_implied_entry() {
        // "A" 排在 "PHP" 之前，先以推导方式加入 PHP，随后直接命中补全版本
        let detector = detector(json!({
            "Application": {"html": "generator-app", "implies": "PHP"},
            "PHP": {"cats": [27], "headers": {"X-Powered-By": "^php/?([\\d.]+)?"}}
        }));
        let mut signals = PageSignals { html: "generator-app".into(), ..Default::default() };
        signals.headers.insert("x-powered-by".into(), "PHP/8.2.1".into());

        let detected = detector.detect(&signals, &NoEvaluator).await;
        assert_eq!(detected.len(), 2);
        assert_eq!(detected[1].name, "PHP");
        assert_eq!(detected[1].version.as_deref(), Some("8.2.1"));
        assert_eq!(detected[1].categories, vec!["27".to_string()]);
    }

    #[tokio::test]
    async fn test_relations_expand_one_level_only() {
        let detector = detector(json!({
            "Gatsby": {"js": {"___gatsby": true}, "implies": "React"},
            "React": {"implies": "JavaScript"}
        }));
        let mut signals = PageSignals::default();
        signals.js_vars.insert("___gatsby".into(), json!(true));

        let detected = detector.detect(&signals, &NoEvaluator).await;
        let names: Vec<&str> = detected.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Gatsby", "React"]);
    }

    #[tokio::test]
    async fn test_nested_paths_evaluated_through_probe() {
        let detector = detector(json!({
            "jQuery": {"js": {"jQuery.fn.jquery": "([\\d.]+)", "jq.1.fn": ""}}
        }));
        let evaluator = RecordingEvaluator::default()
            .with("jQuery.fn.jquery", Ok(Some(json!("3.7.1"))));

        let detected = detector.detect(&PageSignals::default(), &evaluator).await;
        assert_eq!(detected[0].version.as_deref(), Some("3.7.1"));
        assert_eq!(evaluator.calls(), vec!["jQuery.fn.jquery".to_string()]);
    }

    #[tokio::test]
    async fn test_evaluation_errors_count_as_no_value() {
        let detector = detector(json!({
            "Vue.js": {"js": {"Vue.version": "^(.+)$"}}
        }));
        let evaluator = RecordingEvaluator::default()
            .with("Vue.version", Err(TracerError::ProbeError(String::new())));

        let detected = detector.detect(&PageSignals::default(), &evaluator).await;
        assert!(detected.is_empty());
        assert_eq!(evaluator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_version_from_html_skips_remaining_categories() {
        let detector = detector(json!({
            "Drupal": {"html": "Drupal ([\\d.]+)", "js": {"Drupal.settings": ""}}
        }));
        let signals = PageSignals { html: "Powered by Drupal 10.1".into(), ..Default::default() };
        let evaluator = RecordingEvaluator::default();

        let detected = detector.detect(&signals, &evaluator).await;
        assert_eq!(detected[0].version.as_deref(), Some("10.1"));
        assert!(evaluator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_match_without_version_keeps_consulting() {
        let detector = detector(json!({
            "Drupal": {"html": "Drupal", "js": {"Drupal.settings.version": "([\\d.]+)"}}
        }));
        let signals = PageSignals { html: "Drupal".into(), ..Default::default() };
        let evaluator = RecordingEvaluator::default()
            .with("Drupal.settings.version", Ok(Some(json!(10.2))));

        let detected = detector.detect(&signals, &evaluator).await;
        assert_eq!(detected[0].version.as_deref(), Some("10.2"));
    }

    #[tokio::test]
    async fn test_keyed_rules_run_in_declared_order() {
        let detector = detector(json!({
            "Headers": {"headers": {"X-Zeta": "z-(\\d+)", "X-Alpha": "a-(\\d+)"}},
            "Vars": {"js": {"zz": "^(z\\d)$", "aa": "^(a\\d)$"}}
        }));
        let mut signals = PageSignals::default();
        signals.headers.insert("x-zeta".into(), "z-1".into());
        signals.headers.insert("x-alpha".into(), "a-2".into());
        signals.js_vars.insert("zz".into(), json!("z9"));
        signals.js_vars.insert("aa".into(), json!("a8"));

        let detected = detector.detect(&signals, &NoEvaluator).await;
        assert_eq!(detected[0].name, "Headers");
        assert_eq!(detected[0].version.as_deref(), Some("1"));
        assert_eq!(detected[1].name, "Vars");
        assert_eq!(detected[1].version.as_deref(), Some("z9"));
    }

    #[tokio::test]
    async fn test_empty_library_detects_nothing() {
        let detector = detector(json!({}));
        let signals = PageSignals { html: "<html>anything</html>".into(), ..Default::default() };

        assert!(detector.detect(&signals, &NoEvaluator).await.is_empty());
    }
}
