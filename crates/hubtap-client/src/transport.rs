//! WebSocket dialing and the hub-level handshake.
//!
//! Addresses are accepted in the HTTP form most hub servers advertise
//! (`http://host:port/hub`) and normalized to the WebSocket scheme before
//! dialing. After the upgrade the hub handshake runs under a deadline that
//! covers both the dial and the server's handshake response.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use hubtap_core::{
    decode_handshake_response, encode_handshake_request, CodecError, HandshakeRequest,
};

use tungstenite::Message;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server address: {0:?}")]
    BadAddress(String),

    #[error("WebSocket failure: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("server rejected handshake: {0}")]
    Rejected(String),

    #[error("connection closed during handshake")]
    ClosedDuringHandshake,

    #[error("encoded frame is not valid UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ── Connection setup ──────────────────────────────────────────────────────────

/// An established WebSocket connection that has completed the hub handshake.
pub(crate) struct HubTransport {
    /// The open socket, ready to carry hub messages.
    pub ws: WsStream,
    /// Bytes the server pipelined behind its handshake response.
    pub leftover: Vec<u8>,
}

/// Rewrites an HTTP-style hub address to the WebSocket scheme.
///
/// Schemes match case-insensitively and come out lowercase; a bare
/// `host:port/path` is assumed to be plaintext.
pub fn normalize_url(address: &str) -> Result<String, TransportError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(TransportError::BadAddress(address.to_owned()));
    }
    let url = if let Some(rest) = strip_scheme(trimmed, "http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = strip_scheme(trimmed, "https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = strip_scheme(trimmed, "ws://") {
        format!("ws://{rest}")
    } else if let Some(rest) = strip_scheme(trimmed, "wss://") {
        format!("wss://{rest}")
    } else {
        format!("ws://{trimmed}")
    };
    Ok(url)
}

/// Strips `scheme` from the front of `address`, matching it case-insensitively
/// as RFC 3986 requires for scheme names.
fn strip_scheme<'a>(address: &'a str, scheme: &str) -> Option<&'a str> {
    let head = address.as_bytes().get(..scheme.len())?;
    head.eq_ignore_ascii_case(scheme.as_bytes())
        .then(|| &address[scheme.len()..])
}

/// Dials `address` and performs the hub handshake.
///
/// The whole sequence shares one deadline: WebSocket upgrade, handshake
/// request, and the server's acceptance frame.
pub(crate) async fn open(
    address: &str,
    handshake_timeout: Duration,
) -> Result<HubTransport, TransportError> {
    let url = normalize_url(address)?;
    let deadline = Instant::now() + handshake_timeout;

    debug!(%url, "dialing hub");
    let (mut ws, response) = match timeout_at(deadline, connect_async(&url)).await {
        Err(_) => return Err(TransportError::HandshakeTimeout(handshake_timeout)),
        Ok(result) => result?,
    };
    debug!(status = response.status().as_u16(), "WebSocket upgrade accepted");

    let leftover = negotiate(&mut ws, deadline, handshake_timeout).await?;
    info!(%url, "hub handshake accepted");
    Ok(HubTransport { ws, leftover })
}

/// Sends the handshake request and waits for the server's response frame.
///
/// Returns any bytes that arrived in the same WebSocket message after the
/// response; they are the start of the hub message stream.
async fn negotiate(
    ws: &mut WsStream,
    deadline: Instant,
    handshake_timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    let request = encode_handshake_request(&HandshakeRequest::json_v1())?;
    ws.send(text_frame(request)?).await?;

    let mut pending: Vec<u8> = Vec::new();
    loop {
        match decode_handshake_response(&pending) {
            Ok((response, consumed)) => {
                if let Some(error) = response.error {
                    return Err(TransportError::Rejected(error));
                }
                return Ok(pending.split_off(consumed));
            }
            Err(CodecError::NeedMoreData { .. }) => {}
            Err(other) => return Err(TransportError::Codec(other)),
        }

        let message = match timeout_at(deadline, ws.next()).await {
            Err(_) => return Err(TransportError::HandshakeTimeout(handshake_timeout)),
            Ok(None) => return Err(TransportError::ClosedDuringHandshake),
            Ok(Some(result)) => result?,
        };
        match message {
            Message::Text(text) => pending.extend_from_slice(text.as_bytes()),
            Message::Binary(bytes) => pending.extend_from_slice(&bytes),
            Message::Close(_) => return Err(TransportError::ClosedDuringHandshake),
            // ping/pong are answered by the WebSocket layer
            _ => {}
        }
    }
}

/// Wraps an encoded hub frame in a WebSocket text message.
///
/// Hub frames are JSON plus a 0x1E separator, both valid UTF-8, so the
/// conversion only fails if the encoder produced raw bytes.
pub(crate) fn text_frame(frame: Vec<u8>) -> Result<Message, TransportError> {
    let text = String::from_utf8(frame).map_err(|_| TransportError::NotUtf8)?;
    Ok(Message::Text(text))
}
