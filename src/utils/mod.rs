//! 工具模块：版本提取、检测结果合并、Header转换
pub mod version_extractor;
pub mod detection_updater;
pub mod header_converter;

pub use self::version_extractor::VersionExtractor;
pub use self::detection_updater::DetectionUpdater;
pub use self::header_converter::HeaderConverter;

#[cfg(test)]
pub mod stub_server;
