use std::sync::{Arc, Mutex, PoisonError};

use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};

/// 记录重定向目标的响应头
pub const REDIRECT_HISTORY_HEADER: &str = "x-redirect-history";

/// 记录重定向状态码的响应头
pub const REDIRECT_STATUS_HISTORY_HEADER: &str = "x-redirect-status-history";

/// 一次重定向
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    pub from: Url,
    pub to: Url,
    pub status: StatusCode,
}

/// 重定向记录器
///
/// reqwest 的重定向策略挂在 Client 上，这里通过共享的列表把每次跳转记下来，
/// 每个请求发出前需要 `reset`。
#[derive(Debug, Clone, Default)]
pub struct RedirectTracker {
    hops: Arc<Mutex<Vec<RedirectHop>>>,
}

impl RedirectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最多跟随 `max_redirects` 次重定向，超过后请求失败
    pub fn policy(&self, max_redirects: usize) -> Policy {
        let tracker = self.clone();
        Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error(format!("重定向次数过多 (最多 {} 次)", max_redirects));
            }

            if let Some(from) = attempt.previous().last() {
                tracing::info!("Redirecting! {} to {}", from, attempt.url());
                tracker.record(RedirectHop {
                    from: from.clone(),
                    to: attempt.url().clone(),
                    status: attempt.status(),
                });
            }
            attempt.follow()
        })
    }

    fn record(&self, hop: RedirectHop) {
        self.hops.lock().unwrap_or_else(PoisonError::into_inner).push(hop);
    }

    pub fn reset(&self) {
        self.hops.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// 取出当前请求的重定向记录
    pub fn take(&self) -> Vec<RedirectHop> {
        std::mem::take(&mut *self.hops.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_record_and_take() {
        let tracker = RedirectTracker::new();
        let shared = tracker.clone();
        shared.record(RedirectHop {
            from: Url::parse("http://a.test/old").unwrap(),
            to: Url::parse("http://a.test/new").unwrap(),
            status: StatusCode::FOUND,
        });

        let hops = tracker.take();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].status, StatusCode::FOUND);
        assert!(tracker.take().is_empty());
    }

    #[test]
    fn test_tracker_reset() {
        let tracker = RedirectTracker::new();
        tracker.record(RedirectHop {
            from: Url::parse("http://a.test/").unwrap(),
            to: Url::parse("http://b.test/").unwrap(),
            status: StatusCode::MOVED_PERMANENTLY,
        });
        tracker.reset();
        assert!(tracker.take().is_empty());
    }
}
