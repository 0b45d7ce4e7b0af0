use std::path::PathBuf;

use reqwest::Url;
use thiserror::Error;

/// 适配器统一的 Result 类型
pub type Result<T> = std::result::Result<T, AdapterError>;

/// 适配器错误
///
/// 4xx 响应不属于错误，会作为普通响应保存。
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("相对路径 `{0}` 需要先设置 base URL")]
    MissingBaseUrl(String),

    #[error("代理配置无效: {0}")]
    InvalidProxy(String),

    /// 5xx 响应，响应不会被保存
    #[error("服务器错误 {status}: {url}")]
    Server { status: u16, url: Url },

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL 解析失败: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("读取上传文件失败 {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSS 选择器无效: {0}")]
    Selector(String),

    #[error("尚未收到任何响应")]
    NoResponse,
}

impl AdapterError {
    /// 返回服务器错误的状态码
    pub fn server_status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
