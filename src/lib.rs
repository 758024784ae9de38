//! techtracer - 网页技术栈指纹识别核心

// 导出全局错误类型
pub use self::error::{TracerError, TracerResult};

// 导出配置模块
pub use self::config::{GlobalConfig, ConfigManager, CustomConfigBuilder};

// 导出签名库模块核心接口
pub use self::rule::{
    RawSignature, RawSignatureMap, CategoryRule, Detection, TechnologyEntry,
    CategorizedTechnologies, ScanReport, ScanResponse, PartitionSource, RemoteSource,
    LocalSource, SignatureCache, SnapshotCache, CategoryTable, SignatureStore,
};

// 导出编译模块核心接口
pub use self::compiler::{CompiledSignature, PatternRule, SignatureMap, SignatureCompiler};

// 导出页面探测接口
pub use self::probe::{ExpressionEvaluator, HttpPageProbe, MetaTag, NoEvaluator, PageProbe, PageSignals};

// 导出提取模块核心接口
pub use self::extractor::HtmlExtractor;

// 导出工具模块核心接口
pub use self::utils::{VersionExtractor, HeaderConverter, DetectionUpdater};

// 导出检测模块核心接口
pub use self::detector::{TechDetector, CategoryOrganizer, TechnologyService};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod compiler;
pub mod probe;
pub mod extractor;
pub mod utils;
pub mod detector;
