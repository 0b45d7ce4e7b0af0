pub mod config;
pub mod error;
pub mod http;

pub use config::{AdapterConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
pub use error::{AdapterError, Result};
pub use http::{
    AdapterResponse, CookieEntry, CookieJar, Document, HttpAdapter, ProxyConfig, RequestAdapter,
};

use tracing_subscriber::EnvFilter;

/// 初始化日志（只初始化一次）
///
/// 优先使用 `RUST_LOG`，未设置时使用 `default_filter`。
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
