//! 编译模块：将原始签名编译为可执行的模式规则
pub mod pattern;
pub mod compiler;

pub use self::pattern::{
    CompileStats, CompiledSignature, DomRule, KeyedRules, PatternRule, RegexRule, RuleMatch, SignatureMap,
};
pub use self::compiler::{SignatureCompiler, split_directives};
