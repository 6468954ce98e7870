//! FastCGI transport: ships one prepared environment and body to a responder
//! and returns its raw output.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::warn;

// FastCGI record types and roles.
const FCGI_VERSION: u8 = 1;
const FCGI_BEGIN_REQUEST: u8 = 1;
const FCGI_END_REQUEST: u8 = 3;
const FCGI_PARAMS: u8 = 4;
const FCGI_STDIN: u8 = 5;
const FCGI_STDOUT: u8 = 6;
const FCGI_STDERR: u8 = 7;
const FCGI_RESPONDER: u16 = 1;

const MAX_STDERR_BYTES: usize = 1024 * 1024;

/// Raw responder output: the logical stdout stream plus captured stderr.
#[derive(Debug, Clone, Default)]
pub struct TransportOutput {
    pub stdout: Bytes,
    pub stderr: Bytes,
}

/// Boundary to the FastCGI responder. Implementations own connection
/// lifecycle and timeouts; callers only see raw bytes or an error.
#[async_trait]
pub trait FcgiTransport: Send + Sync {
    async fn request(
        &self,
        env: &HashMap<String, String>,
        body: &str,
    ) -> Result<TransportOutput>;
}

/// One TCP connection per request, no multiplexing, no pooling.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

fn put_nv_len(buf: &mut BytesMut, len: usize) {
    if len < 128 {
        buf.put_u8(len as u8);
    } else {
        buf.put_u32((len as u32) | 0x8000_0000);
    }
}

fn put_nv_pair(buf: &mut BytesMut, name: &[u8], value: &[u8]) {
    put_nv_len(buf, name.len());
    put_nv_len(buf, value.len());
    buf.extend_from_slice(name);
    buf.extend_from_slice(value);
}

async fn write_record(
    stream: &mut TcpStream,
    record_type: u8,
    request_id: u16,
    content: &[u8],
) -> Result<()> {
    if content.len() > 65535 {
        return Err(anyhow!("FastCGI record too large: {}", content.len()));
    }
    let padding = (8 - (content.len() % 8)) % 8;
    let header = [
        FCGI_VERSION,
        record_type,
        (request_id >> 8) as u8,
        (request_id & 0xff) as u8,
        (content.len() >> 8) as u8,
        (content.len() & 0xff) as u8,
        padding as u8,
        0,
    ];
    stream.write_all(&header).await?;
    if !content.is_empty() {
        stream.write_all(content).await?;
    }
    if padding > 0 {
        const PAD: [u8; 8] = [0u8; 8];
        stream.write_all(&PAD[..padding]).await?;
    }
    Ok(())
}

#[async_trait]
impl FcgiTransport for TcpTransport {
    async fn request(
        &self,
        env: &HashMap<String, String>,
        body: &str,
    ) -> Result<TransportOutput> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| anyhow!("FastCGI connect timeout: {}", addr))?
            .with_context(|| format!("FastCGI connect failed: {}", addr))?;
        let _ = stream.set_nodelay(true);

        let request_id: u16 = 1;

        // BEGIN_REQUEST: responder role, no keep-alive.
        let mut begin = [0u8; 8];
        begin[0] = (FCGI_RESPONDER >> 8) as u8;
        begin[1] = (FCGI_RESPONDER & 0xff) as u8;
        write_record(&mut stream, FCGI_BEGIN_REQUEST, request_id, &begin).await?;

        // PARAMS, then the empty terminator record.
        let mut params = BytesMut::new();
        for (name, value) in env {
            put_nv_pair(&mut params, name.as_bytes(), value.as_bytes());
        }
        for chunk in params.chunks(65535) {
            write_record(&mut stream, FCGI_PARAMS, request_id, chunk).await?;
        }
        write_record(&mut stream, FCGI_PARAMS, request_id, &[]).await?;

        // STDIN, then the empty terminator record.
        for chunk in body.as_bytes().chunks(65535) {
            write_record(&mut stream, FCGI_STDIN, request_id, chunk).await?;
        }
        write_record(&mut stream, FCGI_STDIN, request_id, &[]).await?;
        stream.flush().await?;

        // Read records until END_REQUEST, accumulating stdout.
        let mut stdout = BytesMut::new();
        let mut stderr = BytesMut::new();
        loop {
            let mut header = [0u8; 8];
            timeout(self.timeout, stream.read_exact(&mut header))
                .await
                .map_err(|_| anyhow!("FastCGI response read timeout"))??;
            let record_type = header[1];
            let record_id = u16::from_be_bytes([header[2], header[3]]);
            if record_id != request_id && record_id != 0 {
                return Err(anyhow!(
                    "unexpected FastCGI request id in response: {}",
                    record_id
                ));
            }
            let content_len = u16::from_be_bytes([header[4], header[5]]) as usize;
            let padding_len = header[6] as usize;

            let mut payload = vec![0u8; content_len + padding_len];
            if !payload.is_empty() {
                timeout(self.timeout, stream.read_exact(&mut payload))
                    .await
                    .map_err(|_| anyhow!("FastCGI response read timeout"))??;
            }
            payload.truncate(content_len);

            match record_type {
                FCGI_STDOUT => stdout.extend_from_slice(&payload),
                FCGI_STDERR => {
                    let remaining = MAX_STDERR_BYTES.saturating_sub(stderr.len());
                    let take = remaining.min(payload.len());
                    stderr.extend_from_slice(&payload[..take]);
                }
                FCGI_END_REQUEST => break,
                _ => {}
            }
        }

        if !stderr.is_empty() {
            warn!(
                stderr = %String::from_utf8_lossy(&stderr),
                "FastCGI responder wrote to stderr"
            );
        }

        Ok(TransportOutput {
            stdout: stdout.freeze(),
            stderr: stderr.freeze(),
        })
    }
}
