use async_trait::async_trait;

use crate::error::Result;
use crate::http::client::HttpAdapter;

/// 请求适配器接口
///
/// 只包含发起请求和读取响应体的最小集合，方便在调用方替换为其他实现。
#[async_trait]
pub trait RequestAdapter: Send {
    fn set_base_url(&mut self, base_url: &str) -> Result<()>;

    async fn get(&mut self, uri: &str, params: &[(&str, &str)]) -> Result<()>;

    async fn post(&mut self, uri: &str, params: &[(&str, &str)]) -> Result<()>;

    fn response_body(&self) -> Option<&[u8]>;
}

#[async_trait]
impl RequestAdapter for HttpAdapter {
    fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        HttpAdapter::set_base_url(self, base_url).map(|_| ())
    }

    async fn get(&mut self, uri: &str, params: &[(&str, &str)]) -> Result<()> {
        HttpAdapter::get(self, uri, params).await.map(|_| ())
    }

    async fn post(&mut self, uri: &str, params: &[(&str, &str)]) -> Result<()> {
        HttpAdapter::post(self, uri, params).await.map(|_| ())
    }

    fn response_body(&self) -> Option<&[u8]> {
        HttpAdapter::response_body(self)
    }
}
