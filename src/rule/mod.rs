//! 规则模块：负责签名库的加载、缓存、分类表与数据模型定义
pub mod model;
pub mod source;
pub mod cache;
pub mod category;
pub mod loader;

// 导出核心接口
pub use self::model::{
    RawSignature, RawSignatureMap, CategoryRule, Detection, TechnologyEntry,
    CategorizedTechnologies, ScanReport, ScanResponse,
};
pub use self::source::{PartitionSource, RemoteSource, LocalSource, partition_keys, partition_file_name};
pub use self::cache::{SignatureCache, SnapshotCache};
pub use self::category::{CategoryTable, MISC_CATEGORY_ID, MISC_CATEGORY_NAME};
pub use self::loader::SignatureStore;
