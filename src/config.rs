use std::{fmt, path::Path};

use serde::Deserialize;

use crate::{listing::MAX_KEYS, model::object::PutOptions};

/// Adapter configuration, read from a TOML file.
#[derive(Clone, Debug, Deserialize)]
pub struct AdapterConfig {
    pub bucket: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub prefix: String,
    pub client: ClientConfig,
    /// Defaults merged into every write.
    #[serde(default)]
    pub options: PutOptions,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
    /// When false, `list_contents` always lists recursively.
    #[serde(default)]
    pub honor_list_recursion: bool,
}

#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
    pub endpoint: String,
    #[serde(default)]
    pub is_cname: bool,
    #[serde(default)]
    pub security_token: Option<String>,
    #[serde(default)]
    pub request_proxy: Option<String>,
    #[serde(default)]
    pub ssl: bool,
    /// Socket timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Connect timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_list_page_size() -> usize {
    MAX_KEYS
}

fn default_timeout() -> u64 {
    5_184_000
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            secret: String::new(),
            endpoint: String::new(),
            is_cname: false,
            security_token: None,
            request_proxy: None,
            ssl: false,
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            max_retries: default_max_retries(),
            region: default_region(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("is_cname", &self.is_cname)
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .field("request_proxy", &self.request_proxy)
            .field("ssl", &self.ssl)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_retries", &self.max_retries)
            .field("region", &self.region)
            .finish()
    }
}

impl AdapterConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: AdapterConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.is_empty() {
            anyhow::bail!("bucket must not be empty");
        }
        if self.client.endpoint.is_empty() {
            anyhow::bail!("client.endpoint must not be empty");
        }
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.list_page_size.clamp(1, MAX_KEYS)
    }
}
