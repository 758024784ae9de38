//! 检测模块：技术检测核心逻辑
pub mod analyzer;
pub mod detector;
pub mod organizer;
pub mod scanner;

// 导出核心接口
pub use self::analyzer::{EvalState, is_evaluable_path};
pub use self::detector::TechDetector;
pub use self::organizer::CategoryOrganizer;
pub use self::scanner::{TechnologyService, NO_ACTIVE_WEB_VIEW};
