//! 编译后模式模型
//! 签名加载时一次性解析 `pattern\;version:N`，扫描时不再重复切分与编译

use std::collections::BTreeMap;
use regex::Regex;

use crate::utils::VersionExtractor;

/// 单条正则规则
#[derive(Debug, Clone)]
pub struct RegexRule {
    pub regex: Regex,
    // 版本捕获分组，默认 1
    pub version_group: usize,
}

/// 模式规则
#[derive(Debug, Clone)]
pub enum PatternRule {
    /// 忽略大小写的正则 + 版本分组
    Regex(RegexRule),
    /// 仅判断存在（js 中写作 `true` 的规则）
    PresenceOnly,
}

/// 单条规则的命中结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub version: Option<String>,
}

impl PatternRule {
    /// 对输入求值，命中时返回（可能为空的）版本
    pub fn evaluate(&self, subject: &str) -> Option<RuleMatch> {
        match self {
            PatternRule::Regex(rule) => rule.regex.captures(subject).map(|captures| RuleMatch {
                version: VersionExtractor::extract(&captures, rule.version_group),
            }),
            PatternRule::PresenceOnly => Some(RuleMatch { version: None }),
        }
    }
}

/// 带键的规则组（meta 名 / header 名 / cookie 名）
#[derive(Debug, Clone)]
pub struct KeyedRules {
    pub key: String,
    pub rules: Vec<PatternRule>,
}

/// DOM 规则：选择器归约为标签名，仅与标签频次表比对
#[derive(Debug, Clone)]
pub struct DomRule {
    pub selector: String,
    pub tag: String,
}

/// 技术编译后的签名
#[derive(Debug, Clone, Default)]
pub struct CompiledSignature {
    pub name: String,
    pub html: Vec<PatternRule>,
    pub meta: Vec<KeyedRules>,
    pub script_src: Vec<PatternRule>,
    pub headers: Vec<KeyedRules>,
    pub js: Vec<(String, PatternRule)>,
    pub cookies: Vec<KeyedRules>,
    pub dom: Vec<DomRule>,
    pub url: Vec<PatternRule>,
    pub css: Vec<PatternRule>,
    pub robots: Vec<PatternRule>,
    pub category_ids: Vec<String>,
    pub icon: Option<String>,
    pub requires: Vec<String>,
    pub implies: Vec<String>,
}

/// 编译统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub signatures: usize,
    pub rules: usize,
    pub invalid_rules: usize,
}

/// 编译后的签名库（技术名 -> 签名），加载后只读
#[derive(Debug, Clone, Default)]
pub struct SignatureMap {
    signatures: BTreeMap<String, CompiledSignature>,
    stats: CompileStats,
}

impl SignatureMap {
    pub fn new(signatures: BTreeMap<String, CompiledSignature>, stats: CompileStats) -> Self {
        Self { signatures, stats }
    }

    pub fn get(&self, name: &str) -> Option<&CompiledSignature> {
        self.signatures.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signatures.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CompiledSignature)> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    /// 技术自身声明的分类，未知技术返回空
    pub fn categories_of(&self, name: &str) -> Vec<String> {
        self.signatures
            .get(name)
            .map(|sig| sig.category_ids.clone())
            .unwrap_or_default()
    }

    pub fn icon_of(&self, name: &str) -> Option<String> {
        self.signatures.get(name).and_then(|sig| sig.icon.clone())
    }
}
