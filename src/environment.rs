//! Builds the CGI execution environment for one call.

use crate::config::CgiProviderConfig;
use crate::rpc::RpcRequest;
use std::collections::HashMap;
use tracing::debug;

// CGI meta-variable names the bridge reads or writes.
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";

/// Prefix under which provider parameters carry CGI meta-variable values.
pub const CGI_KEY_PREFIX: &str = "CGI_";

/// Prefix applied to request attachments so they cannot collide with
/// CGI-standard names.
pub const ATTACHMENT_PREFIX: &str = "RPC_";

/// Server-identity variables present in every built environment.
const SERVER_ENVIRONMENT: &[(&str, &str)] = &[("SERVER_SOFTWARE", "rpcgi")];

/// Merges the static server identity, the configured needed meta-variables,
/// and the request attachments into one environment map.
///
/// A needed variable without a configured `CGI_`-prefixed value is omitted;
/// the gap is logged, never fatal.
pub fn build_environment(
    config: &CgiProviderConfig,
    request: &RpcRequest,
) -> HashMap<String, String> {
    let mut env = HashMap::new();

    for (name, value) in SERVER_ENVIRONMENT {
        env.insert(name.to_string(), value.to_string());
    }

    for name in &config.needed_env {
        let key = format!("{CGI_KEY_PREFIX}{name}");
        match config.cgi_params.get(&key) {
            Some(value) => {
                env.insert(name.clone(), value.clone());
            }
            None => debug!(key = %key, "needed CGI variable has no configured value"),
        }
    }

    for (key, value) in &request.attachments {
        env.insert(format!("{ATTACHMENT_PREFIX}{key}"), value.clone());
    }

    env
}
