pub mod adapter;
pub mod client;
pub mod cookies;
pub mod document;
pub mod proxy;
pub mod redirect;
pub mod response;

pub use adapter::RequestAdapter;
pub use client::HttpAdapter;
pub use cookies::{CookieEntry, CookieJar, StoredCookie};
pub use document::{Document, Element};
pub use proxy::{ProxyConfig, ProxyCredentials, ProxyScheme};
pub use redirect::{RedirectHop, REDIRECT_HISTORY_HEADER, REDIRECT_STATUS_HISTORY_HEADER};
pub use response::{AdapterResponse, TransferStats};
