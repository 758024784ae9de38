//! 分类表：分类ID -> 分类名称，进程启动时加载一次，只读

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

use super::model::CategoryRule;
use crate::error::{TracerError, TracerResult};

/// 无分类技术归入的分类ID
pub const MISC_CATEGORY_ID: &str = "19";
/// 分类表缺失该ID时的兜底名称
pub const MISC_CATEGORY_NAME: &str = "Miscellaneous";

/// 分类表
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    names: HashMap<String, String>,
}

impl CategoryTable {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// 解析 categories.json（`{id: {name, ...}}`），只消费 name
    pub fn from_json(json: &str) -> TracerResult<Self> {
        let rules: HashMap<String, CategoryRule> = serde_json::from_str(json)?;
        let names = rules
            .into_iter()
            .map(|(id, rule)| (id, rule.name))
            .collect();
        Ok(Self { names })
    }

    /// 从文件加载，失败时记录错误并回退到内置分类
    pub fn load(path: &Path) -> Self {
        let loaded = std::fs::read_to_string(path)
            .map_err(TracerError::from)
            .and_then(|json| Self::from_json(&json));

        match loaded {
            Ok(table) => {
                debug!("分类表加载成功：{}，分类数：{}", path.display(), table.len());
                table
            }
            Err(e) => {
                error!("分类表 {} 加载失败：{}，使用内置分类", path.display(), e);
                Self::builtin()
            }
        }
    }

    /// 内置默认分类
    pub fn builtin() -> Self {
        let default_cats = [
            (1, "CMS"), (2, "Message Boards"), (3, "Database Managers"), (4, "Documentation"),
            (5, "Widgets"), (6, "Ecommerce"), (7, "Photo Galleries"), (8, "Wikis"),
            (9, "Hosting Panels"), (10, "Analytics"), (11, "Blogs"), (12, "JavaScript Frameworks"),
            (13, "Issue Trackers"), (14, "Video Players"), (15, "Comment Systems"), (16, "Security"),
            (17, "Font Scripts"), (18, "Web Frameworks"), (19, "Miscellaneous"), (20, "Editors"),
        ];

        let names = default_cats
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        Self { names }
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// 显示名称；未知ID合成 `Category <id>`
    pub fn display_name(&self, id: &str) -> String {
        self.name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Category {}", id))
    }

    /// Miscellaneous 分类的显示名称
    pub fn misc_name(&self) -> String {
        self.name_of(MISC_CATEGORY_ID)
            .unwrap_or(MISC_CATEGORY_NAME)
            .to_string()
    }

    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
