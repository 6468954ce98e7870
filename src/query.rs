//! Encodes RPC call arguments into a CGI query string or form body.

use crate::rpc::{Argument, RpcRequest};
use std::fmt::Write as _;
use tracing::warn;
use url::form_urlencoded::byte_serialize;

/// The only serialization mode with a defined argument encoding.
pub const SERIALIZATION_SIMPLE: &str = "simple";

/// Field appended to every encoding so the responder can correlate the call.
pub const REQUEST_ID_FIELD: &str = "requestIdFromClient";

/// Encodes the request's first argument under the given serialization mode.
///
/// Unsupported modes and argument shapes degrade to an empty base encoding;
/// the trailing request-id field is appended unconditionally, so the result
/// is never empty. Map keys are sorted to keep the encoding stable within a
/// call.
pub fn encode_arguments(request: &RpcRequest, serialization: &str) -> String {
    let mut encoded = String::new();

    if let Some(argument) = request.arguments.first() {
        if serialization == SERIALIZATION_SIMPLE {
            match argument {
                Argument::Map(map) => {
                    let mut keys: Vec<&String> = map.keys().collect();
                    keys.sort();
                    for key in keys {
                        if !encoded.is_empty() {
                            encoded.push('&');
                        }
                        encoded.push_str(key);
                        encoded.push('=');
                        encoded.extend(byte_serialize(map[key].as_bytes()));
                    }
                }
                Argument::Text(text) => {
                    encoded = byte_serialize(text.as_bytes()).collect();
                }
                Argument::Opaque(_) => {}
            }
        } else {
            warn!(
                serialization,
                "unsupported serialization mode, sending only the request id field"
            );
        }
    }

    let _ = write!(encoded, "&{REQUEST_ID_FIELD}={}", request.request_id);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request_with(request_id: u64, arguments: Vec<Argument>) -> RpcRequest {
        RpcRequest {
            request_id,
            arguments,
            attachments: HashMap::new(),
        }
    }

    #[test]
    fn text_argument_is_escaped_whole() {
        let request = request_with(7, vec![Argument::Text("q=test value".to_string())]);
        let encoded = encode_arguments(&request, SERIALIZATION_SIMPLE);
        assert_eq!(encoded, "q%3Dtest+value&requestIdFromClient=7");
    }

    #[test]
    fn map_argument_encodes_sorted_pairs() {
        let map: HashMap<String, String> = [("b", "x y"), ("a", "1")]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let request = request_with(42, vec![Argument::Map(map)]);
        let encoded = encode_arguments(&request, SERIALIZATION_SIMPLE);
        // '+' is the form encoding of a space.
        assert_eq!(encoded, "a=1&b=x+y&requestIdFromClient=42");
    }

    #[test]
    fn unsupported_mode_yields_only_the_request_id_field() {
        let request = request_with(9, vec![Argument::Text("ignored".to_string())]);
        let encoded = encode_arguments(&request, "hessian");
        assert_eq!(encoded, "&requestIdFromClient=9");
    }

    #[test]
    fn opaque_argument_yields_only_the_request_id_field() {
        let request = request_with(3, vec![Argument::Opaque(bytes::Bytes::from_static(b"\x01"))]);
        let encoded = encode_arguments(&request, SERIALIZATION_SIMPLE);
        assert_eq!(encoded, "&requestIdFromClient=3");
    }

    #[test]
    fn missing_arguments_still_carry_the_request_id_field() {
        let request = request_with(11, Vec::new());
        let encoded = encode_arguments(&request, SERIALIZATION_SIMPLE);
        assert_eq!(encoded, "&requestIdFromClient=11");
    }
}
