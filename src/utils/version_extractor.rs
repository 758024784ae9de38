//! 版本提取工具模块
//! 负责从正则捕获结果中，按 `\;version:N` 指定的分组提取技术版本号

use regex::Captures;

/// 版本提取工具类
/// 提供静态方法 `extract` 用于版本号提取
pub struct VersionExtractor;

impl VersionExtractor {
    /// 从正则捕获结果中提取版本号
    ///
    /// # 参数
    /// - `captures`: 正则捕获结果
    /// - `group`: 版本所在分组序号（0 为整体匹配，不参与版本提取）
    ///
    /// # 返回值
    /// - `Some(String)`: 分组参与了匹配且内容非空，原样返回
    /// - `None`: 分组不存在 / 未参与匹配 / 内容为空
    pub fn extract(captures: &Captures, group: usize) -> Option<String> {
        if group == 0 {
            return None;
        }
        captures
            .get(group)
            .map(|matched| matched.as_str())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}

// 单元测试
#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_extract_first_group() {
        let regex = Regex::new(r#"nginx(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("nginx/1.21.6").unwrap();

        assert_eq!(VersionExtractor::extract(&captures, 1), Some("1.21.6".to_string()));
    }

    #[test]
    fn test_extract_group_not_participating() {
        // 分组存在但未参与匹配，应返回 None
        let regex = Regex::new(r#"nginx(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("nginx").unwrap();

        assert_eq!(VersionExtractor::extract(&captures, 1), None);
    }

    #[test]
    fn test_extract_missing_group() {
        // 占位分组不存在（2），应返回 None
        let regex = Regex::new(r#"nginx(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("nginx/1.21.6").unwrap();

        assert_eq!(VersionExtractor::extract(&captures, 2), None);
    }

    #[test]
    fn test_extract_selected_group_exactly() {
        // 多分组时按序号取值，不做裁剪
        let regex = Regex::new(r#"(\w+)/v( [\d.]+)-(\w+)"#).unwrap();
        let captures = regex.captures("rust/v 1.75.0-stable").unwrap();

        assert_eq!(VersionExtractor::extract(&captures, 2), Some(" 1.75.0".to_string()));
        assert_eq!(VersionExtractor::extract(&captures, 3), Some("stable".to_string()));
        assert_eq!(VersionExtractor::extract(&captures, 0), None);
    }

    #[test]
    fn test_extract_empty_group() {
        let regex = Regex::new(r#"react(\d*)"#).unwrap();
        let captures = regex.captures("react").unwrap();

        assert_eq!(VersionExtractor::extract(&captures, 1), None);
    }
}
