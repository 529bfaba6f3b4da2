//! WebSocket transport using `tokio-tungstenite`.
//!
//! One socket per [`Transport`]. The I/O task bridges the transport channels
//! and the socket until either side closes, then reports
//! [`TransportEvent::Closed`] exactly once.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::COOKIE},
    },
};
use url::Url;

use crate::{
    error::TransportError,
    transport::{Connector, Transport, TransportEvent},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket transports to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
    cookie: Option<String>,
}

impl WebSocketConnector {
    /// Connector for `url`, sending `cookie` as the `Cookie` header.
    pub fn new(url: Url, cookie: Option<String>) -> Self {
        Self { url, cookie }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self) -> impl Future<Output = Result<Transport, TransportError>> + Send {
        let url = self.url.clone();
        let cookie = self.cookie.clone();

        async move {
            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::Connection(format!("invalid request: {e}")))?;

            if let Some(cookie) = cookie {
                let value = HeaderValue::from_str(&cookie)
                    .map_err(|e| TransportError::Connection(format!("invalid cookie: {e}")))?;
                request.headers_mut().insert(COOKIE, value);
            }

            tracing::info!(%url, "connecting to websocket");
            let (socket, _) = connect_async(request)
                .await
                .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?;

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let task = tokio::spawn(run_socket(socket, out_rx, in_tx));

            Ok(Transport::new(out_tx, in_rx).with_task(task.abort_handle()))
        }
    }
}

/// Bridge channels and socket until either side closes.
async fn run_socket(
    socket: Socket,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    incoming: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut write, mut read) = socket.split();

    let reason = loop {
        tokio::select! {
            text = outgoing.recv() => match text {
                Some(text) => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        break Some(format!("write failed: {e}"));
                    }
                },
                None => {
                    // Transport handle dropped
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                },
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if incoming.send(TransportEvent::Text(text.to_string())).is_err() {
                        break None;
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        break Some(format!("pong failed: {e}"));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "server closed websocket");
                    break frame.map(|f| f.reason.to_string());
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            },
        }
    };

    tracing::debug!(?reason, "websocket task finished");
    let _ = incoming.send(TransportEvent::Closed { reason });
}
