//! 检测结果更新工具
//! 负责合并检测结果（按技术名去重、补全版本）以及 requires/implies 一层推导

use crate::compiler::{CompiledSignature, SignatureMap};
use crate::rule::Detection;

/// 检测结果更新工具
pub struct DetectionUpdater;

impl DetectionUpdater {
    /// 记录一次直接命中；已存在时只在原版本为空时补全版本
    pub fn update(
        detected: &mut Vec<Detection>,
        tech_name: &str,
        version: Option<String>,
        categories: &[String],
    ) {
        match detected.iter_mut().find(|d| d.name == tech_name) {
            Some(existing) => {
                if existing.version.is_none() {
                    existing.version = version;
                }
            }
            None => detected.push(Detection::new(tech_name.to_string(), version, categories.to_vec())),
        }
    }

    /// 应用关联推导规则（先 requires 后 implies），仅展开一层
    pub fn apply_relations(
        signature: &CompiledSignature,
        signatures: &SignatureMap,
        detected: &mut Vec<Detection>,
    ) {
        for related in signature.requires.iter().chain(signature.implies.iter()) {
            if detected.iter().any(|d| &d.name == related) {
                continue;
            }
            detected.push(Detection::new(
                related.clone(),
                None,
                signatures.categories_of(related),
            ));
        }
    }
}
