//! Request and response containers exchanged with the RPC framework.

use bytes::Bytes;
use std::collections::HashMap;

/// A single positional RPC argument, resolved to the shapes the simple
/// serialization can carry.
///
/// The RPC framework decides the variant once, at the call boundary; the
/// bridge never inspects payload types at runtime.
#[derive(Debug, Clone)]
pub enum Argument {
    /// A plain string, encoded as one escaped value.
    Text(String),
    /// A string-to-string mapping, encoded as `key=value` pairs.
    Map(HashMap<String, String>),
    /// Anything no supported serialization understands; never encoded.
    Opaque(Bytes),
}

/// Per-invocation call context. Read-only to the bridge.
#[derive(Debug, Clone, Default)]
pub struct RpcRequest {
    pub request_id: u64,
    /// Ordered positional arguments; the simple serialization only reads the
    /// first.
    pub arguments: Vec<Argument>,
    /// Out-of-band metadata forwarded to the responder under a fixed prefix.
    pub attachments: HashMap<String, String>,
}

/// Failure indicator carried by an unsuccessful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcException {
    pub code: u16,
    /// Error classification; mirrors `code` for responder-reported failures.
    pub kind: u16,
    pub message: String,
}

impl RpcException {
    /// Builds an exception whose code and classification both carry `status`.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: status,
            kind: status,
            message: message.into(),
        }
    }
}

/// Result of a call: a responder body or a failure indicator, never both.
#[derive(Debug, Clone)]
pub enum Outcome {
    Value(String),
    Exception(RpcException),
}

/// Structured response returned for every call, success or failure.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub request_id: u64,
    /// Elapsed processing time in whole milliseconds.
    pub process_time_ms: u64,
    /// Responder headers (on success) plus any framework-level metadata.
    pub attachments: HashMap<String, String>,
    pub outcome: Outcome,
}

impl RpcResponse {
    pub fn success(request_id: u64, value: String) -> Self {
        Self {
            request_id,
            process_time_ms: 0,
            attachments: HashMap::new(),
            outcome: Outcome::Value(value),
        }
    }

    pub fn failure(request_id: u64, exception: RpcException) -> Self {
        Self {
            request_id,
            process_time_ms: 0,
            attachments: HashMap::new(),
            outcome: Outcome::Exception(exception),
        }
    }

    /// The responder body, if the call succeeded.
    pub fn value(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Value(value) => Some(value),
            Outcome::Exception(_) => None,
        }
    }

    /// The failure indicator, if the call failed.
    pub fn exception(&self) -> Option<&RpcException> {
        match &self.outcome {
            Outcome::Value(_) => None,
            Outcome::Exception(exception) => Some(exception),
        }
    }
}
