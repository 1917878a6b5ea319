use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
///
/// 按处理策略划分：
/// - `NotFound`：预期内的缺失（ISBN 未找到、OCR 尚未完成），总是就地恢复
/// - `Api`：外部服务返回异常（非 2xx、格式不符）
/// - `Tool`：外部光栅化工具缺失或执行失败
/// - `File`：文件系统访问失败
#[derive(Debug, Error)]
pub enum AppError {
    /// 预期内的缺失
    #[error("未找到: {0}")]
    NotFound(#[from] NotFoundError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 外部工具错误
    #[error("工具错误: {0}")]
    Tool(#[from] ToolError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 预期内的缺失
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// 所有检索策略都没有找到 ISBN
    #[error("未找到 ISBN: {title}")]
    Isbn { title: String },
    /// OCR 结果尚未生成（可重试）
    #[error("OCR 尚未完成: {image_id}")]
    OcrNotReady { image_id: String },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回非 2xx 状态
    #[error("API返回错误状态 ({endpoint}): {status} {message}")]
    BadStatus {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 响应格式不符合预期
    #[error("API响应格式错误 ({endpoint}): {message}")]
    InvalidResponse { endpoint: String, message: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: serde_json::Error,
    },
}

/// 外部工具错误
#[derive(Debug, Error)]
pub enum ToolError {
    /// 工具不存在（致命，没有备用方案）
    #[error("找不到外部工具 `{program}`，请确认已安装并位于 PATH 中")]
    Missing { program: String },
    /// 工具以非零状态退出
    #[error("`{program}` 执行失败 (退出码: {code:?}): {input}")]
    Failed {
        program: String,
        code: Option<i32>,
        input: PathBuf,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {}", path.display())]
    NotFound { path: PathBuf },
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 工作区目录不存在
    #[error("目录不存在: {}", path.display())]
    DirectoryNotFound { path: PathBuf },
    /// 无路径信息的 IO 错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),
    /// 执行脚本或页面操作失败
    #[error("执行脚本失败: {0}")]
    ScriptExecutionFailed(#[from] chromiumoxide::error::CdpError),
    /// 等待页面跳转超时
    #[error("等待页面跳转到 {expected} 超时")]
    NavigationTimeout { expected: String },
    /// 页面内脚本报告了错误
    #[error("页面操作失败: {0}")]
    PageError(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量不存在
    #[error("环境变量 {var_name} 未设置")]
    EnvVarNotFound { var_name: String },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({}): {source}", path.display())]
    FileParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    InvalidValue { key: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed { source: err })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "http".to_string());
        AppError::api_request_failed(endpoint, err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::Io(err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建非 2xx 状态错误
    pub fn api_bad_status(
        endpoint: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        AppError::Api(ApiError::BadStatus {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        })
    }

    /// 创建响应格式错误
    pub fn api_invalid_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Api(ApiError::InvalidResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return AppError::File(FileError::NotFound { path });
        }
        AppError::File(FileError::ReadFailed { path, source })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否为预期内的缺失（记录警告后跳过）
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// 是否为 OCR 尚未完成（轮询时唯一可重试的错误）
    pub fn is_ocr_not_ready(&self) -> bool {
        matches!(self, AppError::NotFound(NotFoundError::OcrNotReady { .. }))
    }

    /// 是否为暂时性的网络或 HTTP 错误（上传时唯一可重试的错误）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Api(ApiError::RequestFailed { .. } | ApiError::BadStatus { .. })
        )
    }

    /// 是否应终止整个运行
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Tool(ToolError::Missing { .. }) | AppError::Config(_)
        )
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
