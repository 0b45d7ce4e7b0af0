use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};
use crate::http::proxy::ProxyConfig;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPad; CPU OS 9_0 like Mac OS X) AppleWebKit/600.1.4 (KHTML, like Gecko) Version/9.0 Mobile/13A340 Safari/600.1.4";

/// 默认最多跟随的重定向次数
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// 适配器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            proxy: None,
        }
    }
}

impl AdapterConfig {
    /// 从 JSON 字符串加载配置，缺失的字段使用默认值
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AdapterError::Config(format!("配置 JSON 无效: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载配置
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AdapterError::Config(format!("读取配置文件失败 {:?}: {}", path, e)))?;
        let config = Self::from_json(&content)?;
        tracing::debug!("已加载配置: {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(AdapterError::Config("timeout_secs 必须大于 0".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(AdapterError::Config(
                "connect_timeout_secs 必须大于 0".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AdapterError::Config("user_agent 不能为空".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
