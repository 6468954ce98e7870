//! The bridge orchestrator: drives one RPC call through environment
//! construction, argument encoding, FastCGI dispatch, and response mapping.

use crate::config::CgiProviderConfig;
use crate::environment::{
    build_environment, CONTENT_LENGTH, CONTENT_TYPE, QUERY_STRING, REQUEST_METHOD,
};
use crate::query::encode_arguments;
use crate::response::{parse_response, ParsedResponse, ParseError};
use crate::rpc::{RpcException, RpcRequest, RpcResponse};
use crate::transport::{FcgiTransport, TcpTransport, TransportOutput};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::warn;

pub const HTTP_METHOD_GET: &str = "GET";
pub const HTTP_METHOD_POST: &str = "POST";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// FastCGI-backed RPC provider. Configuration is immutable after
/// construction; `call` borrows shared state only, so one provider serves
/// any number of concurrent calls.
pub struct CgiProvider {
    config: CgiProviderConfig,
    transport: Arc<dyn FcgiTransport>,
}

impl CgiProvider {
    /// Validates the configuration and wires the default TCP transport to
    /// the configured responder address.
    pub fn new(config: CgiProviderConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(TcpTransport::new(
            config.host.clone(),
            config.port,
            Duration::from_millis(config.timeout_ms),
        ));
        Ok(Self { config, transport })
    }

    /// Wires a caller-supplied transport in place of the TCP default.
    pub fn with_transport(config: CgiProviderConfig, transport: Arc<dyn FcgiTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &CgiProviderConfig {
        &self.config
    }

    /// Executes one call. Never fails outward: every per-call fault is
    /// resolved into a failure response here, at the call boundary.
    pub async fn call(&self, request: &RpcRequest) -> RpcResponse {
        let started = Instant::now();

        let mut response = match self.call_inner(request).await {
            Ok(parsed) => {
                let mut response = RpcResponse::success(request.request_id, parsed.body);
                response.attachments.extend(parsed.headers);
                response
            }
            Err(err) => {
                warn!(
                    request_id = request.request_id,
                    error = %err,
                    "cgi provider call failed"
                );
                RpcResponse::failure(
                    request.request_id,
                    RpcException::from_status(err.status(), err.to_string()),
                )
            }
        };
        response.process_time_ms = started.elapsed().as_millis() as u64;
        response
    }

    async fn call_inner(&self, request: &RpcRequest) -> Result<ParsedResponse, ParseError> {
        let mut env = build_environment(&self.config, request);
        let mut body = String::new();

        let method = env.get(REQUEST_METHOD).cloned().unwrap_or_default();
        match method.as_str() {
            HTTP_METHOD_GET => {
                let query = encode_arguments(request, &self.config.serialization);
                env.insert(QUERY_STRING.to_string(), query);
            }
            HTTP_METHOD_POST => {
                body = encode_arguments(request, &self.config.serialization);
                env.insert(CONTENT_TYPE.to_string(), FORM_URLENCODED.to_string());
                env.insert(CONTENT_LENGTH.to_string(), body.len().to_string());
            }
            _ => {}
        }

        let output = match self.transport.request(&env, &body).await {
            Ok(output) => output,
            Err(err) => {
                // Call-fatal but not process-fatal: parsing the empty output
                // below produces the failure response.
                warn!(error = %err, "FastCGI transport failed, treating responder output as empty");
                TransportOutput::default()
            }
        };

        let content = String::from_utf8_lossy(&output.stdout);
        parse_response(&content)
    }
}
