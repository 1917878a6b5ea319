use crate::error::{AppResult, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "pdf_to_cosense.toml";

/// 导入方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// 在已登录的浏览器页面中执行导入
    Browser,
    /// 使用 connect.sid + CSRF token 直接调用 API
    Api,
    /// 不执行导入阶段
    Disabled,
}

impl ImportMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "browser" => Some(Self::Browser),
            "api" => Some(Self::Api),
            "disabled" | "off" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 工作区目录（存放 PDF、图片目录和 JSON）
    pub workspace_dir: PathBuf,
    /// Gyazo access token
    pub gyazo_token: String,
    /// Cosense 的 connect.sid（API 导入时使用）
    pub cosense_sid: String,
    /// 要插入到每本书开头的个人资料页（形如 `project/page`）
    pub profile_page: Option<String>,
    /// 新建项目名前缀，项目名为 `<前缀><ISBN>`
    pub project_prefix: String,

    // --- 光栅化 ---
    /// 光栅化程序
    pub rasterizer_program: String,
    /// 输出分辨率 (DPI)
    pub rasterize_resolution: u32,
    /// 同时转换的 PDF 数量
    pub rasterize_concurrency: usize,

    // --- ISBN ---
    /// 同时检索的目录数量（对免费 API 保持礼貌，默认 1）
    pub isbn_concurrency: usize,
    /// 所有检索都失败时是否询问操作员
    pub interactive_isbn: bool,

    // --- OCR ---
    /// 同时生成 JSON 的书籍数量
    pub book_concurrency: usize,
    /// 每本书同时上传/轮询的图片数量
    pub ocr_concurrency: usize,
    /// 上传后等待 OCR 的时间（秒）
    pub ocr_quiescence_secs: u64,
    /// 上传最大尝试次数
    pub upload_max_attempts: usize,
    /// 上传重试间隔（毫秒）
    pub upload_retry_delay_ms: u64,
    /// OCR 轮询最大尝试次数
    pub ocr_poll_max_attempts: usize,
    /// OCR 轮询的初始退避（毫秒），之后每次翻倍
    pub ocr_poll_base_delay_ms: u64,

    // --- 导入 ---
    /// 导入方式
    pub import_mode: ImportMode,
    /// API 导入时每批页面数
    pub import_batch_size: usize,
    /// API 导入批次间隔（毫秒）
    pub import_batch_delay_ms: u64,

    // --- 浏览器 ---
    /// 浏览器调试端口，设置后连接到已启动的浏览器
    pub browser_debug_port: Option<u16>,
    /// 自行启动浏览器时使用的用户数据目录（保存登录状态）
    pub browser_profile_dir: PathBuf,

    // --- 服务地址 ---
    pub cosense_base_url: String,
    pub gyazo_upload_url: String,
    pub gyazo_api_base_url: String,
    pub gyazo_image_base_url: String,
    pub ndl_search_url: String,
    pub google_books_url: String,

    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 需要人工处理的问题记录文件
    pub warn_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            gyazo_token: String::new(),
            cosense_sid: String::new(),
            profile_page: None,
            project_prefix: "book-".to_string(),
            rasterizer_program: "mutool".to_string(),
            rasterize_resolution: 600,
            rasterize_concurrency: 2,
            isbn_concurrency: 1,
            interactive_isbn: true,
            book_concurrency: 1,
            ocr_concurrency: 50,
            ocr_quiescence_secs: 10,
            upload_max_attempts: 4,
            upload_retry_delay_ms: 3_000,
            ocr_poll_max_attempts: 6,
            ocr_poll_base_delay_ms: 2_000,
            import_mode: ImportMode::Browser,
            import_batch_size: 100,
            import_batch_delay_ms: 1_000,
            browser_debug_port: None,
            browser_profile_dir: PathBuf::from("browser-profile"),
            cosense_base_url: "https://scrapbox.io".to_string(),
            gyazo_upload_url: "https://upload.gyazo.com/api/upload".to_string(),
            gyazo_api_base_url: "https://api.gyazo.com/api".to_string(),
            gyazo_image_base_url: "https://gyazo.com".to_string(),
            ndl_search_url: "https://ndlsearch.ndl.go.jp/api/opensearch".to_string(),
            google_books_url: "https://www.googleapis.com/books/v1/volumes".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            warn_file: "warn.txt".to_string(),
        }
    }
}

impl Config {
    /// 只从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取配置文件（不存在则忽略），再用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let base = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| crate::error::AppError::file_read_failed(path, e))?;
            Self::from_toml_str(&content).map_err(|source| ConfigError::FileParseFailed {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };

        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 解析 TOML 配置内容
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            workspace_dir: env_var("WORKSPACE_DIR").map(PathBuf::from).unwrap_or(d.workspace_dir),
            gyazo_token: env_var("GYAZO_TOKEN").unwrap_or(d.gyazo_token),
            cosense_sid: env_var("COSENSE_SID").unwrap_or(d.cosense_sid),
            profile_page: env_var("PROFILE_PAGE").or(d.profile_page),
            project_prefix: env_var("PROJECT_PREFIX").unwrap_or(d.project_prefix),
            rasterizer_program: env_var("RASTERIZER_PROGRAM").unwrap_or(d.rasterizer_program),
            rasterize_resolution: env_parse("RASTERIZE_RESOLUTION").unwrap_or(d.rasterize_resolution),
            rasterize_concurrency: env_parse("RASTERIZE_CONCURRENCY").unwrap_or(d.rasterize_concurrency),
            isbn_concurrency: env_parse("ISBN_CONCURRENCY").unwrap_or(d.isbn_concurrency),
            interactive_isbn: env_parse("INTERACTIVE_ISBN").unwrap_or(d.interactive_isbn),
            book_concurrency: env_parse("BOOK_CONCURRENCY").unwrap_or(d.book_concurrency),
            ocr_concurrency: env_parse("OCR_CONCURRENCY").unwrap_or(d.ocr_concurrency),
            ocr_quiescence_secs: env_parse("OCR_QUIESCENCE_SECS").unwrap_or(d.ocr_quiescence_secs),
            upload_max_attempts: env_parse("UPLOAD_MAX_ATTEMPTS").unwrap_or(d.upload_max_attempts),
            upload_retry_delay_ms: env_parse("UPLOAD_RETRY_DELAY_MS").unwrap_or(d.upload_retry_delay_ms),
            ocr_poll_max_attempts: env_parse("OCR_POLL_MAX_ATTEMPTS").unwrap_or(d.ocr_poll_max_attempts),
            ocr_poll_base_delay_ms: env_parse("OCR_POLL_BASE_DELAY_MS").unwrap_or(d.ocr_poll_base_delay_ms),
            import_mode: env_var("IMPORT_MODE").and_then(|v| ImportMode::parse(&v)).unwrap_or(d.import_mode),
            import_batch_size: env_parse("IMPORT_BATCH_SIZE").unwrap_or(d.import_batch_size),
            import_batch_delay_ms: env_parse("IMPORT_BATCH_DELAY_MS").unwrap_or(d.import_batch_delay_ms),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(d.browser_debug_port),
            browser_profile_dir: env_var("BROWSER_PROFILE_DIR").map(PathBuf::from).unwrap_or(d.browser_profile_dir),
            cosense_base_url: env_var("COSENSE_BASE_URL").unwrap_or(d.cosense_base_url),
            gyazo_upload_url: env_var("GYAZO_UPLOAD_URL").unwrap_or(d.gyazo_upload_url),
            gyazo_api_base_url: env_var("GYAZO_API_BASE_URL").unwrap_or(d.gyazo_api_base_url),
            gyazo_image_base_url: env_var("GYAZO_IMAGE_BASE_URL").unwrap_or(d.gyazo_image_base_url),
            ndl_search_url: env_var("NDL_SEARCH_URL").unwrap_or(d.ndl_search_url),
            google_books_url: env_var("GOOGLE_BOOKS_URL").unwrap_or(d.google_books_url),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(d.verbose_logging),
            output_log_file: env_var("OUTPUT_LOG_FILE").unwrap_or(d.output_log_file),
            warn_file: env_var("WARN_FILE").unwrap_or(d.warn_file),
        }
    }

    /// 检查并发数等必须为正的配置项
    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("rasterize_concurrency", self.rasterize_concurrency),
            ("isbn_concurrency", self.isbn_concurrency),
            ("book_concurrency", self.book_concurrency),
            ("ocr_concurrency", self.ocr_concurrency),
            ("upload_max_attempts", self.upload_max_attempts),
            ("ocr_poll_max_attempts", self.ocr_poll_max_attempts),
            ("import_batch_size", self.import_batch_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "必须大于 0".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// OCR 阶段开始前确认 token 已配置
    pub fn validate_for_ocr(&self) -> AppResult<()> {
        if self.gyazo_token.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "GYAZO_TOKEN".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// API 导入前确认 connect.sid 已配置
    pub fn validate_for_api_import(&self) -> AppResult<()> {
        if self.cosense_sid.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "COSENSE_SID".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn ocr_quiescence(&self) -> Duration {
        Duration::from_secs(self.ocr_quiescence_secs)
    }

    pub fn upload_retry_delay(&self) -> Duration {
        Duration::from_millis(self.upload_retry_delay_ms)
    }

    pub fn ocr_poll_base_delay(&self) -> Duration {
        Duration::from_millis(self.ocr_poll_base_delay_ms)
    }

    pub fn import_batch_delay(&self) -> Duration {
        Duration::from_millis(self.import_batch_delay_ms)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let config = Config::default();
        assert_eq!(config.isbn_concurrency, 1);
        assert_eq!(config.upload_max_attempts, 4);
        assert_eq!(config.ocr_quiescence(), Duration::from_secs(10));
        assert_eq!(config.import_batch_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = Config::from_toml_str(
            r#"
            workspace_dir = "books"
            import_mode = "api"
            ocr_concurrency = 8
            profile_page = "me/profile"
            "#,
        )
        .unwrap();
        assert_eq!(config.workspace_dir, PathBuf::from("books"));
        assert_eq!(config.import_mode, ImportMode::Api);
        assert_eq!(config.ocr_concurrency, 8);
        assert_eq!(config.profile_page.as_deref(), Some("me/profile"));
        assert_eq!(config.rasterizer_program, "mutool");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = Config {
            ocr_concurrency: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ocr_concurrency"));
    }

    #[test]
    fn empty_token_fails_ocr_validation() {
        let config = Config::default();
        assert!(config.validate_for_ocr().is_err());
        let config = Config {
            gyazo_token: "t".into(),
            ..Config::default()
        };
        assert!(config.validate_for_ocr().is_ok());
    }

    #[test]
    fn import_mode_parses_aliases() {
        assert_eq!(ImportMode::parse("API"), Some(ImportMode::Api));
        assert_eq!(ImportMode::parse("off"), Some(ImportMode::Disabled));
        assert_eq!(ImportMode::parse("gui"), None);
    }
}
