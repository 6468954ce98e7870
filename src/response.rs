//! Parses raw FastCGI responder output into status, headers, and body.

use std::collections::HashMap;
use thiserror::Error;

/// Status reported to the caller when the responder output is unusable.
const BAD_GATEWAY: u16 = 502;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The output never contained the CRLF CRLF header/body separator.
    #[error("cannot parse FastCGI response")]
    MissingSeparator,
}

impl ParseError {
    /// Status code surfaced to the caller in place of a parsed one.
    pub fn status(&self) -> u16 {
        match self {
            ParseError::MissingSeparator => BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Splits responder output on the first blank line into a header block and a
/// verbatim body.
///
/// A leading `Status:` line sets the status (second whitespace-delimited
/// token; a malformed number degrades to 0); without one the status is 200.
/// Header lines split on the first colon, names verbatim, values trimmed;
/// lines without a colon are skipped and the `Status` name never appears in
/// the mapping. Duplicate names keep the last occurrence.
pub fn parse_response(content: &str) -> Result<ParsedResponse, ParseError> {
    let Some((header_block, body)) = content.split_once("\r\n\r\n") else {
        return Err(ParseError::MissingSeparator);
    };

    let mut status = 200;
    let mut headers = HashMap::new();

    for (index, line) in header_block.split("\r\n").enumerate() {
        if index == 0 {
            if let Some(rest) = line.strip_prefix("Status:") {
                status = rest
                    .split_whitespace()
                    .next()
                    .and_then(|code| code.parse().ok())
                    .unwrap_or(0);
            }
        }

        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name == "Status" {
            continue;
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }

    Ok(ParsedResponse {
        status,
        headers,
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_sets_status_and_is_excluded_from_headers() {
        let parsed =
            parse_response("Status: 404 Not Found\r\nContent-Type: text/plain\r\n\r\nNope")
                .expect("parse");
        assert_eq!(parsed.status, 404);
        assert_eq!(
            parsed.headers.get("Content-Type").map(String::as_str),
            Some("text/plain")
        );
        assert!(!parsed.headers.contains_key("Status"));
        assert_eq!(parsed.body, "Nope");
    }

    #[test]
    fn missing_status_line_defaults_to_200() {
        let parsed =
            parse_response("Content-Type: text/html\r\n\r\n<p>hi</p>").expect("parse");
        assert_eq!(parsed.status, 200);
        assert_eq!(
            parsed.headers.get("Content-Type").map(String::as_str),
            Some("text/html")
        );
        assert_eq!(parsed.body, "<p>hi</p>");
    }

    #[test]
    fn missing_separator_is_a_hard_failure() {
        let err = parse_response("Content-Type: text/plain\r\nno body follows")
            .expect_err("must fail");
        assert_eq!(err, ParseError::MissingSeparator);
        assert_eq!(err.status(), 502);
        assert_eq!(err.to_string(), "cannot parse FastCGI response");
    }

    #[test]
    fn empty_input_is_a_hard_failure() {
        assert_eq!(parse_response(""), Err(ParseError::MissingSeparator));
    }

    #[test]
    fn malformed_status_number_degrades_to_zero() {
        let parsed = parse_response("Status: abc\r\n\r\n").expect("parse");
        assert_eq!(parsed.status, 0);
        let parsed = parse_response("Status:\r\n\r\n").expect("parse");
        assert_eq!(parsed.status, 0);
    }

    #[test]
    fn header_values_are_trimmed_and_colonless_lines_skipped() {
        let parsed = parse_response(
            "X-One:  padded \r\nnot a header line\r\nX-Two:2\r\n\r\nbody",
        )
        .expect("parse");
        assert_eq!(parsed.headers.get("X-One").map(String::as_str), Some("padded"));
        assert_eq!(parsed.headers.get("X-Two").map(String::as_str), Some("2"));
        assert_eq!(parsed.headers.len(), 2);
    }

    #[test]
    fn duplicate_header_names_keep_the_last_occurrence() {
        let parsed = parse_response("X-Dup: first\r\nX-Dup: second\r\n\r\n").expect("parse");
        assert_eq!(parsed.headers.get("X-Dup").map(String::as_str), Some("second"));
    }

    #[test]
    fn body_after_first_separator_is_verbatim() {
        let parsed =
            parse_response("Content-Type: text/plain\r\n\r\nline\r\n\r\nmore").expect("parse");
        assert_eq!(parsed.body, "line\r\n\r\nmore");
    }

    #[test]
    fn synthesized_response_round_trips() {
        let headers = [("Content-Type", "text/html"), ("X-Cache", "HIT")];
        let body = "<html>ok</html>";
        let mut raw = String::from("Status: 201 Created\r\n");
        for (name, value) in headers {
            raw.push_str(name);
            raw.push_str(": ");
            raw.push_str(value);
            raw.push_str("\r\n");
        }
        raw.push_str("\r\n");
        raw.push_str(body);

        let parsed = parse_response(&raw).expect("parse");
        assert_eq!(parsed.status, 201);
        assert_eq!(parsed.body, body);
        assert_eq!(parsed.headers.len(), headers.len());
        for (name, value) in headers {
            assert_eq!(parsed.headers.get(name).map(String::as_str), Some(value));
        }
    }
}
