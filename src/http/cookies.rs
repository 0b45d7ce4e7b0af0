use std::sync::{PoisonError, RwLock};

use cookie::time::OffsetDateTime;
use cookie::Cookie;
use psl::{List, Psl};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use url::Host;

/// 不会写入 Cookie Jar 的名称
const IGNORED_COOKIE_NAME: &str = "referer";

/// 外部传入的 cookie（通常来自浏览器导出）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    #[serde(default)]
    pub domain: String,
    pub name: String,
    pub value: String,
}

impl CookieEntry {
    pub fn new(domain: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Cookie Jar 中保存的 cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// 小写且去掉前导点
    pub domain: String,
    pub path: String,
    pub host_only: bool,
    pub secure: bool,
    /// None 表示会话 cookie
    pub expires: Option<OffsetDateTime>,
}

impl StoredCookie {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|e| e <= now)
    }

    fn same_identity(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// 是否应该随该 URL 一起发送
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        // IP 地址只做完全匹配
        let exact = self.host_only || is_ip_host(url);
        domain_matches(&self.domain, host, exact) && path_matches(&self.path, url.path())
    }
}

/// 按 base URL 区分的 Cookie Jar
///
/// 实现 reqwest 的 `CookieStore`，响应中的 `Set-Cookie` 会自动写回。
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加外部传入的 cookie，返回是否写入
    ///
    /// `fallback_host` 用于没有 domain 的条目（通常是 base URL 的 host）。
    pub fn add_entry(&self, entry: &CookieEntry, fallback_host: Option<&str>) -> bool {
        if entry.name == IGNORED_COOKIE_NAME {
            return false;
        }

        let domain = entry.domain.trim().trim_start_matches('.').to_lowercase();
        let (domain, host_only) = if domain.is_empty() {
            match fallback_host {
                Some(host) => (host.to_lowercase(), true),
                None => {
                    tracing::warn!("cookie {} 没有 domain，且未设置 base URL，已忽略", entry.name);
                    return false;
                }
            }
        } else {
            (domain, false)
        };

        self.insert(StoredCookie {
            name: entry.name.clone(),
            value: entry.value.clone(),
            domain,
            path: "/".to_string(),
            host_only,
            secure: false,
            expires: None,
        });
        true
    }

    /// 写入 cookie，同名同域同路径的会被替换
    pub fn insert(&self, cookie: StoredCookie) {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.retain(|c| !c.same_identity(&cookie));
        if !cookie.is_expired(OffsetDateTime::now_utc()) {
            cookies.push(cookie);
        }
    }

    /// 解析一行 `Set-Cookie` 并保存
    pub fn store_response_cookie(&self, url: &Url, line: &str) {
        let parsed = match Cookie::parse(line) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("无法解析 Set-Cookie `{}`: {}", line, e);
                return;
            }
        };
        let Some(host) = url.host_str() else {
            return;
        };

        let (domain, host_only) = match parsed.domain() {
            Some(d) => {
                let d = d.trim_start_matches('.').to_lowercase();
                if is_ip_host(url) {
                    if !d.eq_ignore_ascii_case(host) {
                        tracing::debug!("忽略 IP 主机的非本机 cookie {} (domain={}, host={})", parsed.name(), d, host);
                        return;
                    }
                    (d, true)
                } else {
                    // 不允许设置在公共后缀或其他域上
                    if is_public_suffix(&d) || !domain_matches(&d, host, false) {
                        tracing::debug!("忽略无效域的 cookie {} (domain={}, host={})", parsed.name(), d, host);
                        return;
                    }
                    (d, false)
                }
            }
            None => (host.to_lowercase(), true),
        };

        let path = match parsed.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => default_path(url),
        };

        let now = OffsetDateTime::now_utc();
        // Max-Age 优先于 Expires
        let expires = match parsed.max_age() {
            Some(max_age) => Some(now + max_age),
            None => parsed.expires_datetime(),
        };

        self.insert(StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            host_only,
            secure: parsed.secure().unwrap_or(false),
            expires,
        });
    }

    /// 该 URL 可用的 cookie
    pub fn matching(&self, url: &Url) -> Vec<StoredCookie> {
        let now = OffsetDateTime::now_utc();
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        cookies
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .cloned()
            .collect()
    }

    /// 生成 `Cookie` 请求头的值
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let cookies = self.matching(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// 按名称查找（不区分域）
    pub fn get(&self, name: &str) -> Option<StoredCookie> {
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        cookies.iter().find(|c| c.name == name).cloned()
    }

    pub fn all(&self) -> Vec<StoredCookie> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            match header.to_str() {
                Ok(line) => self.store_response_cookie(url, line),
                Err(_) => tracing::debug!("忽略非 ASCII 的 Set-Cookie"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self.header_for(url)?;
        HeaderValue::from_str(&header).ok()
    }
}

fn is_ip_host(url: &Url) -> bool {
    matches!(url.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)))
}

/// 域名本身是否为公共后缀（com、co.uk 等）
fn is_public_suffix(domain: &str) -> bool {
    List.suffix(domain.as_bytes())
        .is_some_and(|suffix| suffix.as_bytes() == domain.as_bytes())
}

/// RFC 6265 域名匹配
fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
    if host_only {
        return cookie_domain.eq_ignore_ascii_case(request_host);
    }
    if request_host.eq_ignore_ascii_case(cookie_domain) {
        return true;
    }
    if request_host.len() > cookie_domain.len() {
        let split = request_host.len() - cookie_domain.len();
        let (head, suffix) = request_host.split_at(split);
        return suffix.eq_ignore_ascii_case(cookie_domain) && head.ends_with('.');
    }
    false
}

/// RFC 6265 路径匹配
fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if let Some(rest) = request_path.strip_prefix(cookie_path) {
        return cookie_path.ends_with('/') || rest.starts_with('/');
    }
    false
}

/// 未指定 Path 时的默认路径
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}
