//! Cosense 页面与项目数据结构

use serde::{Deserialize, Serialize};

/// Cosense 的一个页面
///
/// `lines[0]` 按惯例与 `title` 相同
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub lines: Vec<String>,
}

impl Page {
    pub fn new(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
        }
    }
}

/// 一本书的完整导入数据，对应 `<目录>-ocr.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub pages: Vec<Page>,
}

impl Project {
    /// 在开头插入个人资料页（如果有）
    pub fn with_profile(profile: Option<Page>, pages: Vec<Page>) -> Self {
        Self {
            pages: profile.into_iter().chain(pages).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_cosense_import_shape() {
        let project = Project {
            pages: vec![Page::new("0", vec!["0".into(), "> Hello".into()])],
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["pages"][0]["title"], "0");
        assert_eq!(json["pages"][0]["lines"][1], "> Hello");
    }

    #[test]
    fn profile_page_is_prepended() {
        let profile = Page::new("me", vec!["me".into()]);
        let project = Project::with_profile(
            Some(profile.clone()),
            vec![Page::new("0", vec!["0".into()])],
        );
        assert_eq!(project.pages.len(), 2);
        assert_eq!(project.pages[0], profile);
    }
}
