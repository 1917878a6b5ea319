use serde::{Deserialize, Serialize};

/// ISBN 检索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub isbn: String,
    pub title: String,
    pub authors: Vec<String>,
}

impl BookInfo {
    /// 操作员手动输入时只有 ISBN 和目录名
    pub fn from_manual_input(isbn: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            authors: Vec::new(),
        }
    }
}

/// 规范化 ISBN
///
/// 全角字符折叠为半角，去掉连字符与空白，校验位 `x` 统一为大写
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .map(fold_full_width)
        .filter(|c| !c.is_whitespace() && !is_dash(*c))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// `０`-`９`、`－`、`Ｘ` 等全角 ASCII（U+FF01..=U+FF5E）→ 半角
fn fold_full_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{30FC}')
}
