//! Single connection attempt.
//!
//! Builds the signed handshake request, opens the WebSocket within the
//! configured deadline, and translates handshake rejections into the
//! retryable/non-retryable error split the lifecycle controller acts on.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use kso_core::config::ClientConfig;
use kso_core::constants;
use kso_core::error::{KsoError, KsoResult};

use crate::signer::Signer;

/// The socket type the lifecycle controller owns.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the handshake request: endpoint parse plus the KSO-1 header set.
pub(crate) fn build_request(config: &ClientConfig, signer: &Signer) -> KsoResult<Request> {
    let mut request = config
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| KsoError::Config(format!("invalid endpoint {:?}: {e}", config.endpoint)))?;

    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let (date, authorization) = signer.handshake_headers(&uri);

    let headers = request.headers_mut();
    headers.insert(header_name(constants::HEADER_DATE)?, header_value(&date)?);
    headers.insert(
        header_name(constants::HEADER_AUTHORIZATION)?,
        header_value(&authorization)?,
    );
    if config.ack_mode {
        headers.insert(
            header_name(constants::HEADER_ACK_MODE)?,
            header_value(constants::ACK_MODE_REQUIRED)?,
        );
    }

    Ok(request)
}

/// Open the WebSocket within `write_timeout_ms`.
///
/// Handshake HTTP rejections become `Client` (401/403, non-retryable) or
/// `Server` (everything else, retryable); transport-level failures become
/// retryable `Connection` errors.
pub(crate) async fn open_socket(config: &ClientConfig, signer: &Signer) -> KsoResult<WsStream> {
    let request = build_request(config, signer)?;
    let deadline = Duration::from_millis(config.write_timeout_ms);

    match timeout(deadline, connect_async(request)).await {
        Err(_) => Err(KsoError::Server {
            status: 0,
            message: "Connection timeout".to_string(),
        }),
        Ok(Err(WsError::Http(response))) => Err(translate_status(response.status())),
        Ok(Err(e)) => Err(KsoError::Connection(format!("connect failed: {e}"))),
        Ok(Ok((stream, response))) => {
            debug!(status = %response.status(), endpoint = %config.endpoint, "websocket handshake complete");
            Ok(stream)
        }
    }
}

fn translate_status(status: StatusCode) -> KsoError {
    match status.as_u16() {
        401 => KsoError::Client {
            status: 401,
            message: "Authentication failed".to_string(),
        },
        403 => KsoError::Client {
            status: 403,
            message: "Forbidden".to_string(),
        },
        429 => KsoError::Server {
            status: 429,
            message: "Too many connections".to_string(),
        },
        code => KsoError::Server {
            status: code,
            message: format!("Unexpected status code: {code}"),
        },
    }
}

fn header_name(name: &str) -> KsoResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| KsoError::Connection(format!("invalid header name {name:?}: {e}")))
}

fn header_value(value: &str) -> KsoResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| KsoError::Connection(format!("invalid header value: {e}")))
}
