use std::borrow::Cow;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::error::Result;
use crate::http::document::Document;
use crate::http::redirect::{RedirectHop, REDIRECT_HISTORY_HEADER, REDIRECT_STATUS_HISTORY_HEADER};

/// 请求耗时等传输信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStats {
    pub effective_uri: Url,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

/// 最近一次请求的响应
#[derive(Debug, Clone)]
pub struct AdapterResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    redirects: Vec<RedirectHop>,
    stats: TransferStats,
}

impl AdapterResponse {
    /// 读取完整响应体，并把重定向记录写入响应头
    pub(crate) async fn capture(
        response: Response,
        redirects: Vec<RedirectHop>,
        started: Instant,
    ) -> Result<Self> {
        let status = response.status();
        let effective_uri = response.url().clone();
        let mut headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        append_redirect_headers(&mut headers, &redirects);

        Ok(Self {
            status,
            headers,
            body,
            redirects,
            stats: TransferStats {
                effective_uri,
                elapsed: started.elapsed(),
                completed_at: Utc::now(),
            },
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>, effective_uri: Url) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            redirects: Vec::new(),
            stats: TransferStats {
                effective_uri,
                elapsed: Duration::ZERO,
                completed_at: Utc::now(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// 同名响应头用 `", "` 拼接
    pub fn header_line(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// 响应体能否解析为 JSON
    pub fn is_json(&self) -> bool {
        looks_like_json(&self.body)
    }

    pub fn document(&self) -> Document {
        Document::parse(&self.text())
    }

    /// 重定向后的最终地址
    pub fn effective_uri(&self) -> &Url {
        &self.stats.effective_uri
    }

    pub fn redirects(&self) -> &[RedirectHop] {
        &self.redirects
    }

    /// 依次跳转到的地址
    pub fn redirect_history(&self) -> Vec<String> {
        self.redirects.iter().map(|hop| hop.to.to_string()).collect()
    }

    /// 依次收到的重定向状态码
    pub fn redirect_status_history(&self) -> Vec<u16> {
        self.redirects.iter().map(|hop| hop.status.as_u16()).collect()
    }

    pub fn transfer_stats(&self) -> &TransferStats {
        &self.stats
    }
}

fn append_redirect_headers(headers: &mut HeaderMap, redirects: &[RedirectHop]) {
    for hop in redirects {
        if let Ok(value) = HeaderValue::from_str(hop.to.as_str()) {
            headers.append(REDIRECT_HISTORY_HEADER, value);
        }
        headers.append(REDIRECT_STATUS_HISTORY_HEADER, HeaderValue::from(hop.status.as_u16()));
    }
}

/// 空响应体不算 JSON
pub(crate) fn looks_like_json(body: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(body).is_ok()
}
