use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::{ProtocolError, SubProtocolError};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::Locale;
use crate::error::FeedError;

/// Realtime endpoint for `locale` on the page's own origin; a secure origin
/// selects the secure transport.
pub fn websocket_url(origin: &Url, locale: Locale) -> Result<Url, FeedError> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(FeedError::Scheme(other.to_string())),
    };
    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|_| FeedError::Scheme(origin.scheme().to_string()))?;
    url.set_path(&format!("/ws/{}", locale.as_str()));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[async_trait]
pub trait FeedSocket: Send + 'static {
    /// Next text payload, or `None` once the peer closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, FeedError>>;
}

#[async_trait]
pub trait FeedTransport: Send + Sync + 'static {
    type Socket: FeedSocket;

    async fn connect(&self, url: &Url) -> Result<Self::Socket, FeedError>;
}

/// Websocket transport; offers the URL scheme as subprotocol and accepts a
/// server that picks none.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSocket {
    stream: WsStream,
}

async fn handshake(url: &Url, offer_protocol: bool) -> Result<WsStream, tungstenite::Error> {
    let mut request = url.as_str().into_client_request()?;
    if offer_protocol {
        if let Ok(protocol) = HeaderValue::from_str(url.scheme()) {
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
        }
    }
    let (stream, _) = connect_async(request).await?;
    Ok(stream)
}

#[async_trait]
impl FeedTransport for WsTransport {
    type Socket = WsSocket;

    async fn connect(&self, url: &Url) -> Result<WsSocket, FeedError> {
        let stream = match handshake(url, true).await {
            Err(tungstenite::Error::Protocol(ProtocolError::SecWebSocketSubProtocolError(
                SubProtocolError::NoSubProtocol,
            ))) => {
                debug!(%url, "server chose no subprotocol, retrying without one");
                handshake(url, false).await?
            }
            other => other?,
        };
        debug!(%url, "websocket connected");
        Ok(WsSocket { stream })
    }
}

#[async_trait]
impl FeedSocket for WsSocket {
    async fn next_text(&mut self) -> Option<Result<String, FeedError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_origin_selects_secure_transport() {
        let origin = Url::parse("https://www.uutispuro.fi/fi?x=1").unwrap();
        let url = websocket_url(&origin, Locale::Fi).unwrap();
        assert_eq!(url.as_str(), "wss://www.uutispuro.fi/ws/fi");
    }

    #[test]
    fn plain_origin_keeps_port() {
        let origin = Url::parse("http://localhost:1300/en").unwrap();
        let url = websocket_url(&origin, Locale::En).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:1300/ws/en");
    }

    #[test]
    fn other_schemes_are_rejected() {
        let origin = Url::parse("file:///tmp/index.html").unwrap();
        assert!(matches!(websocket_url(&origin, Locale::Fi), Err(FeedError::Scheme(_))));
    }
}
