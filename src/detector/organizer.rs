//! 分类整理：把检测结果按分类显示名称分组，附带签名库中的图标

use tracing::debug;

use crate::compiler::SignatureMap;
use crate::rule::{CategorizedTechnologies, CategoryTable, Detection, TechnologyEntry};

/// 分类整理器
pub struct CategoryOrganizer;

impl CategoryOrganizer {
    /// 每个检测结果按其分类ID逐一归组；无分类的归入 Miscellaneous
    /// 同名技术在同一分类下只保留第一次出现的条目
    pub fn organize(
        detections: &[Detection],
        signatures: &SignatureMap,
        table: &CategoryTable,
    ) -> CategorizedTechnologies {
        let mut organized = CategorizedTechnologies::new();

        for detection in detections {
            let entry = TechnologyEntry {
                name: detection.name.clone(),
                version: detection.version.clone(),
                icon: signatures.icon_of(&detection.name),
            };

            if detection.categories.is_empty() {
                organized.push(&table.misc_name(), entry);
                continue;
            }

            for id in &detection.categories {
                organized.push(&table.display_name(id), entry.clone());
            }
        }

        debug!("分类整理完成，分类数：{}", organized.len());
        organized
    }
}
