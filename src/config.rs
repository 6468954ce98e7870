//! Provider configuration: set once at initialization, read on every call.

use crate::environment::CGI_KEY_PREFIX;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_CGI_HOST: &str = "127.0.0.1";
pub const DEFAULT_CGI_PORT: u16 = 9000;

/// Parameter keys consumed from an RPC framework's URL-style parameter map.
pub const HOST_PARAM: &str = "CGI_HOST";
pub const PORT_PARAM: &str = "CGI_PORT";
pub const SERIALIZATION_PARAM: &str = "serialization";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CgiProviderConfig {
    /// FastCGI responder host.
    #[serde(default = "default_host")]
    pub host: String,

    /// FastCGI responder port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// CGI meta-variables copied into every call environment. Each entry is
    /// looked up in `cgi_params` under its `CGI_`-prefixed key; a missing
    /// entry is omitted from the environment, not an error.
    #[serde(default = "default_needed_env")]
    pub needed_env: Vec<String>,

    /// Per-variable values, keyed by the `CGI_`-prefixed variable name.
    #[serde(default)]
    pub cgi_params: HashMap<String, String>,

    /// Argument serialization mode; only "simple" enables argument encoding.
    #[serde(default = "default_serialization")]
    pub serialization: String,

    /// Timeout for the FastCGI round-trip (connect and each read), in ms.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    DEFAULT_CGI_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_CGI_PORT
}

fn default_needed_env() -> Vec<String> {
    ["REQUEST_METHOD", "SCRIPT_FILENAME", "DOCUMENT_ROOT"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_serialization() -> String {
    crate::query::SERIALIZATION_SIMPLE.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for CgiProviderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            needed_env: default_needed_env(),
            cgi_params: HashMap::new(),
            serialization: default_serialization(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CgiProviderConfig {
    /// Builds a configuration from an RPC framework's URL-style parameter
    /// mapping (`CGI_HOST`, `CGI_PORT`, `CGI_<NAME>` entries,
    /// `serialization`). Unknown keys are ignored; every `CGI_`-prefixed
    /// entry is retained as a potential meta-variable value.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = parameters.get(HOST_PARAM) {
            config.host = host.clone();
        }
        if let Some(port) = parameters.get(PORT_PARAM) {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(port = %port, "invalid CGI_PORT parameter, keeping default"),
            }
        }
        if let Some(serialization) = parameters.get(SERIALIZATION_PARAM) {
            config.serialization = serialization.clone();
        }
        config.cgi_params = parameters
            .iter()
            .filter(|(key, _)| key.starts_with(CGI_KEY_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(anyhow!("host must not be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("port must be >= 1"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be >= 1"));
        }
        if self.needed_env.iter().any(|name| name.is_empty()) {
            return Err(anyhow!("needed_env entries must not be empty"));
        }
        for key in self.cgi_params.keys() {
            if !key.starts_with(CGI_KEY_PREFIX) {
                return Err(anyhow!(
                    "cgi_params keys must start with {}: '{}'",
                    CGI_KEY_PREFIX,
                    key
                ));
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<CgiProviderConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: CgiProviderConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
