//! 页面渲染服务 - 业务能力层
//!
//! 把一张图片的 OCR 结果渲染为 Cosense 页面：
//!
//! ```text
//! 07
//! prev: [06]
//! next: [08]
//! [[https://gyazo.com/<id>]]
//!
//! > OCR 第一行
//! > OCR 第二行
//! ```

use crate::models::Page;

/// 页面渲染器
#[derive(Debug, Clone)]
pub struct PageRenderer {
    image_base_url: String,
}

impl PageRenderer {
    /// # 参数
    /// - `image_base_url`: 图片页面的基础地址，例如 `https://gyazo.com`
    pub fn new(image_base_url: impl Into<String>) -> Self {
        Self {
            image_base_url: image_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 渲染第 `index` 页（从0开始）
    ///
    /// - 页码宽度为图片总数的位数
    /// - 第0页的 prev 指向自己，最后一页的 next 不做截断
    /// - 上传失败时 `image_id` 为 None，不输出图片链接
    pub fn render(&self, index: usize, total: usize, image_id: Option<&str>, ocr_text: &str) -> Page {
        let width = total.to_string().len();
        let pad = |n: usize| format!("{:0width$}", n, width = width);

        let title = pad(index);
        let prev = index.saturating_sub(1);
        let next = index + 1;

        let mut lines = vec![
            title.clone(),
            format!("prev: [{}]", pad(prev)),
            format!("next: [{}]", pad(next)),
        ];
        if let Some(id) = image_id {
            lines.push(format!("[[{}/{}]]", self.image_base_url, id));
        }
        lines.push(String::new());
        lines.extend(quote_lines(ocr_text));

        Page::new(title, lines)
    }
}

/// 每一行加上 `> ` 引用前缀（空文本得到一个空引用行）
fn quote_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n').map(|line| format!("> {}", line.trim_end_matches('\r')))
}
