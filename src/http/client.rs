use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::http::cookies::{CookieEntry, CookieJar, StoredCookie};
use crate::http::document::Document;
use crate::http::proxy::ProxyConfig;
use crate::http::redirect::RedirectTracker;
use crate::http::response::AdapterResponse;

/// 上一次 GET/POST 的请求签名
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestSignature {
    method: Method,
    uri: String,
    params: Vec<(String, String)>,
}

impl RequestSignature {
    fn new(method: Method, uri: &str, params: &[(&str, &str)]) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// 请求体
enum Payload<'a> {
    Query(&'a [(&'a str, &'a str)]),
    Form(&'a [(&'a str, &'a str)]),
    Multipart(Form),
}

/// 有状态的 HTTP 适配器
///
/// 保存 base URL、代理、按 base URL 区分的 Cookie Jar 以及最近一次响应。
/// 连续两次相同的 GET/POST 不会重复发送请求。
pub struct HttpAdapter {
    config: AdapterConfig,
    base_url: Option<Url>,
    proxy: Option<ProxyConfig>,
    jars: HashMap<String, Arc<CookieJar>>,
    client: OnceCell<Client>,
    redirects: RedirectTracker,
    response: Option<AdapterResponse>,
    current_uri: Option<Url>,
    last_request: Option<RequestSignature>,
}

impl HttpAdapter {
    pub fn new(base_url: Option<&str>, user_agent: Option<&str>) -> Result<Self> {
        let mut config = AdapterConfig {
            base_url: base_url.map(str::to_string),
            ..AdapterConfig::default()
        };
        if let Some(ua) = user_agent {
            config.user_agent = ua.to_string();
        }
        Self::with_config(config)
    }

    pub fn with_config(config: AdapterConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url.as_deref().map(parse_base_url).transpose()?;
        let proxy = config.proxy.clone();

        Ok(Self {
            config,
            base_url,
            proxy,
            jars: HashMap::new(),
            client: OnceCell::new(),
            redirects: RedirectTracker::new(),
            response: None,
            current_uri: None,
            last_request: None,
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// 切换 base URL，后续相对路径都基于它解析
    pub fn set_base_url(&mut self, base_url: &str) -> Result<&mut Self> {
        let url = parse_base_url(base_url)?;
        tracing::debug!("base URL 切换为 {}", url);
        self.base_url = Some(url);
        self.last_request = None;
        self.invalidate_client();
        Ok(self)
    }

    pub fn clear_base_url(&mut self) -> &mut Self {
        self.base_url = None;
        self.last_request = None;
        self.invalidate_client();
        self
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// 设置代理，缺少 IP 或端口的代理不会生效
    pub fn set_proxy(&mut self, proxy: ProxyConfig) -> &mut Self {
        if proxy.is_usable() {
            tracing::info!("代理设置已更新: {}", proxy);
        } else {
            tracing::warn!("代理 {} 缺少 IP 或端口，将不使用代理", proxy);
        }
        self.proxy = Some(proxy);
        self.invalidate_client();
        self
    }

    pub fn clear_proxy(&mut self) -> &mut Self {
        if self.proxy.take().is_some() {
            tracing::info!("代理设置已清除");
            self.invalidate_client();
        }
        self
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// 向当前 base URL 的 Cookie Jar 写入 cookie，Jar 不存在时创建
    ///
    /// 名为 `referer` 的条目会被忽略。
    pub fn set_cookies(&mut self, cookies: &[CookieEntry]) -> &mut Self {
        let key = self.jar_key();
        let host = self
            .base_url
            .as_ref()
            .and_then(|u| u.host_str())
            .map(str::to_string);

        let created = !self.jars.contains_key(&key);
        let jar = self
            .jars
            .entry(key)
            .or_insert_with(|| Arc::new(CookieJar::new()));
        let added = cookies
            .iter()
            .filter(|c| jar.add_entry(c, host.as_deref()))
            .count();
        tracing::debug!("写入 {} 个 cookie (共 {} 个)", added, cookies.len());

        if created {
            self.invalidate_client();
        }
        self
    }

    /// 当前 base URL 的 Cookie Jar
    pub fn cookie_jar(&self) -> Option<&Arc<CookieJar>> {
        self.jars.get(&self.jar_key())
    }

    /// 清空当前 base URL 的 Cookie Jar
    pub fn clear_cookies(&mut self) -> &mut Self {
        if let Some(jar) = self.cookie_jar() {
            jar.clear();
            tracing::debug!("已清空 {} 的 cookie", self.jar_key());
        }
        self
    }

    pub fn cookies(&self) -> Vec<StoredCookie> {
        self.cookie_jar().map(|jar| jar.all()).unwrap_or_default()
    }

    /// GET 请求，参数拼接到查询字符串
    pub async fn get(&mut self, uri: &str, params: &[(&str, &str)]) -> Result<&mut Self> {
        let signature = RequestSignature::new(Method::GET, uri, params);
        if self.is_repeat(&signature) {
            tracing::debug!("重复请求，直接使用上次响应: GET {}", uri);
            return Ok(self);
        }

        self.dispatch(Method::GET, uri, Payload::Query(params)).await?;
        self.last_request = Some(signature);
        Ok(self)
    }

    /// POST 请求，参数以表单提交
    pub async fn post(&mut self, uri: &str, params: &[(&str, &str)]) -> Result<&mut Self> {
        let signature = RequestSignature::new(Method::POST, uri, params);
        if self.is_repeat(&signature) {
            tracing::debug!("重复请求，直接使用上次响应: POST {}", uri);
            return Ok(self);
        }

        self.dispatch(Method::POST, uri, Payload::Form(params)).await?;
        self.last_request = Some(signature);
        Ok(self)
    }

    /// multipart 上传文件，文件名取路径的最后一段
    pub async fn file(&mut self, uri: &str, files: &[(&str, &Path)]) -> Result<&mut Self> {
        let mut form = Form::new();
        for (field, path) in files {
            let bytes = tokio::fs::read(path).await.map_err(|source| AdapterError::File {
                path: path.to_path_buf(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            form = form.part(field.to_string(), Part::bytes(bytes).file_name(file_name));
        }

        self.dispatch(Method::POST, uri, Payload::Multipart(form)).await?;
        Ok(self)
    }

    pub fn response(&self) -> Option<&AdapterResponse> {
        self.response.as_ref()
    }

    pub fn response_code(&self) -> Option<u16> {
        self.response_status().map(|s| s.as_u16())
    }

    pub fn response_status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(AdapterResponse::status)
    }

    pub fn response_body(&self) -> Option<&[u8]> {
        self.response.as_ref().map(AdapterResponse::body)
    }

    pub fn response_text(&self) -> Option<Cow<'_, str>> {
        self.response.as_ref().map(AdapterResponse::text)
    }

    pub fn response_headers(&self) -> Option<&HeaderMap> {
        self.response.as_ref().map(AdapterResponse::headers)
    }

    pub fn redirect_history(&self) -> Vec<String> {
        self.response
            .as_ref()
            .map(AdapterResponse::redirect_history)
            .unwrap_or_default()
    }

    pub fn redirect_status_history(&self) -> Vec<u16> {
        self.response
            .as_ref()
            .map(AdapterResponse::redirect_status_history)
            .unwrap_or_default()
    }

    /// 最近一次请求重定向后的地址
    ///
    /// 5xx 请求也会更新该地址，此时它与 `response()` 不是同一个请求。
    pub fn current_uri(&self) -> Option<&Url> {
        self.current_uri.as_ref()
    }

    pub fn current_uri_path(&self) -> Option<&str> {
        self.current_uri.as_ref().map(Url::path)
    }

    pub fn document(&self) -> Result<Document> {
        self.response
            .as_ref()
            .map(AdapterResponse::document)
            .ok_or(AdapterError::NoResponse)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        self.response.as_ref().ok_or(AdapterError::NoResponse)?.json()
    }

    /// 尚无响应时返回 false
    pub fn is_json(&self) -> bool {
        self.response.as_ref().is_some_and(AdapterResponse::is_json)
    }

    fn is_repeat(&self, signature: &RequestSignature) -> bool {
        self.response.is_some() && self.last_request.as_ref() == Some(signature)
    }

    /// 发出请求前清空签名，失败的请求之后不会命中缓存
    async fn dispatch(&mut self, method: Method, uri: &str, payload: Payload<'_>) -> Result<()> {
        self.last_request = None;
        let url = self.resolve(uri)?;
        let client = self.client()?;
        self.redirects.reset();

        tracing::debug!("{} {}", method, url);
        let mut request = client.request(method.clone(), url);
        request = match payload {
            Payload::Query(params) if !params.is_empty() => request.query(params),
            Payload::Query(_) => request,
            Payload::Form(params) => request.form(params),
            Payload::Multipart(form) => request.multipart(form),
        };

        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        self.current_uri = Some(response.url().clone());
        tracing::debug!("{} {} -> {}", method, response.url(), status);

        // 4xx 按普通响应保存，5xx 作为错误返回
        if status.is_server_error() {
            self.redirects.reset();
            return Err(AdapterError::Server {
                status: status.as_u16(),
                url: response.url().clone(),
            });
        }

        let redirects = self.redirects.take();
        self.response = Some(AdapterResponse::capture(response, redirects, started).await?);
        Ok(())
    }

    fn resolve(&self, uri: &str) -> Result<Url> {
        match Url::parse(uri) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .base_url
                    .as_ref()
                    .ok_or_else(|| AdapterError::MissingBaseUrl(uri.to_string()))?;
                Ok(base.join(uri)?)
            }
            Err(e) => Err(AdapterError::InvalidUrl(format!("{}: {}", uri, e))),
        }
    }

    fn jar_key(&self) -> String {
        self.base_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default()
    }

    fn client(&self) -> Result<Client> {
        self.client.get_or_try_init(|| self.build_client()).cloned()
    }

    fn invalidate_client(&mut self) {
        self.client.take();
    }

    fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.config.user_agent.as_str())
            .timeout(self.config.timeout())
            .connect_timeout(self.config.connect_timeout())
            .referer(true)
            .redirect(self.redirects.policy(self.config.max_redirects));

        match self.proxy.as_ref().filter(|p| p.is_usable()) {
            Some(proxy) => {
                builder = builder.proxy(proxy.to_reqwest_proxy()?);
                tracing::debug!("HTTP 客户端已配置代理: {}", proxy);
            }
            None => builder = builder.no_proxy(),
        }

        if let Some(jar) = self.cookie_jar() {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        Ok(builder.build()?)
    }
}

fn parse_base_url(value: &str) -> Result<Url> {
    let url = Url::parse(value.trim())
        .map_err(|e| AdapterError::InvalidUrl(format!("{}: {}", value, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(AdapterError::InvalidUrl(format!(
            "{}: base URL 必须是 http(s) 地址",
            value
        )));
    }
    Ok(url)
}
