/// 国立国会图书馆 (NDL) OpenSearch 客户端
///
/// 返回的是 RSS/XML，只需要其中的 ISBN、书名和作者，用正则提取即可
use crate::clients::ensure_success;
use crate::config::Config;
use crate::error::{AppError, AppResult, NotFoundError};
use crate::models::{normalize_isbn, BookInfo};
use crate::services::ports::BookSearch;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

const ENDPOINT: &str = "ndl opensearch";

/// NDL 检索客户端
pub struct NdlClient {
    client: reqwest::Client,
    search_url: String,
}

impl NdlClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            search_url: config.ndl_search_url.clone(),
        }
    }
}

#[async_trait]
impl BookSearch for NdlClient {
    fn name(&self) -> &str {
        "NDL"
    }

    async fn search_by_title(&self, title: &str) -> AppResult<BookInfo> {
        debug!("NDL 检索: {}", title);
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("title", title), ("cnt", "5")])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;
        let xml = ensure_success(ENDPOINT, response)
            .await?
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;

        parse_ndl_response(title, &xml)
    }
}

const ISBN_PATTERN: &str = r"<dc:identifier[^>]*dcndl:ISBN[^>]*>([\d-]+)</dc:identifier>";
const TITLE_PATTERN: &str = r"<dc:title>([^<]+)</dc:title>";
const CREATOR_PATTERN: &str = r"<dc:creator>([^<]+)</dc:creator>";

/// 第一处匹配的第一个捕获组
fn first_capture(pattern: &str, xml: &str) -> AppResult<Option<String>> {
    let re = Regex::new(pattern).map_err(|e| AppError::api_invalid_response(ENDPOINT, e.to_string()))?;
    Ok(re
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string()))
}

/// 从 OpenSearch 响应中取第一条 ISBN
///
/// 书名缺失时使用检索用的书名，作者最多取第一位
pub fn parse_ndl_response(query_title: &str, xml: &str) -> AppResult<BookInfo> {
    let isbn = first_capture(ISBN_PATTERN, xml)?
        .map(|raw| normalize_isbn(&raw))
        .filter(|isbn| !isbn.is_empty())
        .ok_or_else(|| NotFoundError::Isbn {
            title: query_title.to_string(),
        })?;

    let title = first_capture(TITLE_PATTERN, xml)?.unwrap_or_else(|| query_title.to_string());
    let authors = first_capture(CREATOR_PATTERN, xml)?.into_iter().collect();

    Ok(BookInfo {
        isbn,
        title,
        authors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcndl="http://ndl.go.jp/dcndl/terms/">
  <channel>
    <item>
      <title>プログラミングRust</title>
      <dc:title>プログラミングRust</dc:title>
      <dc:creator>Jim Blandy 著</dc:creator>
      <dc:identifier xsi:type="dcndl:ISBN">978-4-87311-978-6</dc:identifier>
    </item>
    <item>
      <dc:identifier xsi:type="dcndl:ISBN">4-87311-000-0</dc:identifier>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn first_isbn_is_taken_without_hyphens() {
        let book = parse_ndl_response("rust", SAMPLE).unwrap();
        assert_eq!(book.isbn, "9784873119786");
        assert_eq!(book.title, "プログラミングRust");
        assert_eq!(book.authors, vec!["Jim Blandy 著"]);
    }

    #[test]
    fn missing_title_falls_back_to_query() {
        let xml = r#"<item><dc:identifier xsi:type="dcndl:ISBN">4000000000</dc:identifier></item>"#;
        let book = parse_ndl_response("検索語", xml).unwrap();
        assert_eq!(book.title, "検索語");
        assert!(book.authors.is_empty());
    }

    #[test]
    fn no_isbn_is_not_found() {
        let xml = r#"<rss><channel><item><dc:title>x</dc:title></item></channel></rss>"#;
        let err = parse_ndl_response("x", xml).unwrap_err();
        assert!(err.is_not_found());
    }
}
