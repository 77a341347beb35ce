//! WebSocket transport.
//!
//! Each connection runs two tasks: a writer draining an unbounded channel
//! into the socket sink, and a reader forwarding text frames to the
//! listener. Sends never block the caller.

use std::sync::Arc;

use async_trait::async_trait;
use crowdplay_session::{ConnectRequest, Transport, TransportError, TransportListener};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

struct Connection {
    outgoing: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<()>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Stop both tasks without telling the listener.
    fn abort(self) {
        self.writer.abort();
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }
}

/// [`Transport`] over a `ws://` or `wss://` socket.
#[derive(Default)]
pub struct WebSocketTransport {
    connection: Mutex<Option<Connection>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|c| !c.outgoing.is_closed())
    }
}

fn connect_error(url: &str, message: impl ToString) -> TransportError {
    TransportError::Connect {
        url: url.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(
        &self,
        request: ConnectRequest,
        listener: Arc<dyn TransportListener>,
    ) -> Result<(), TransportError> {
        let url = request.url.as_str();
        let mut handshake = url
            .into_client_request()
            .map_err(|e| connect_error(url, e))?;
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| connect_error(url, e))?;
            let value = HeaderValue::from_str(value).map_err(|e| connect_error(url, e))?;
            handshake.headers_mut().insert(name, value);
        }

        if let Some(previous) = self.connection.lock().take() {
            tracing::debug!("replacing existing connection");
            previous.abort();
        }

        let (socket, _response) = connect_async(handshake)
            .await
            .map_err(|e| connect_error(url, e))?;
        tracing::debug!(url = %url, "websocket open");
        let (mut sink, mut stream) = socket.split();

        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "websocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        *self.connection.lock() = Some(Connection {
            outgoing,
            writer,
            reader: None,
        });
        listener.on_open();

        let reader = tokio::spawn(async move {
            let reason = loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => listener.on_message(text.as_str()),
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!(len = data.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.as_str().to_string()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            tracing::debug!(?reason, "websocket closed");
            listener.on_close(reason);
        });

        if let Some(connection) = self.connection.lock().as_mut() {
            connection.reader = Some(reader);
        } else {
            // Closed from inside on_open.
            reader.abort();
        }
        Ok(())
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        let guard = self.connection.lock();
        let connection = guard.as_ref().ok_or(TransportError::NotConnected)?;
        connection
            .outgoing
            .send(Message::text(text))
            .map_err(|_| TransportError::NotConnected)
    }

    fn close(&self) {
        let Some(connection) = self.connection.lock().take() else {
            return;
        };
        if let Some(reader) = connection.reader {
            reader.abort();
        }
        // The writer exits after flushing the close frame.
        let _ = connection.outgoing.send(Message::Close(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    #[derive(Debug, PartialEq)]
    enum Seen {
        Open,
        Message(String),
        Close(Option<String>),
    }

    struct Recorder(mpsc::UnboundedSender<Seen>);

    impl TransportListener for Recorder {
        fn on_open(&self) {
            let _ = self.0.send(Seen::Open);
        }
        fn on_message(&self, text: &str) {
            let _ = self.0.send(Seen::Message(text.to_string()));
        }
        fn on_close(&self, reason: Option<String>) {
            let _ = self.0.send(Seen::Close(reason));
        }
    }

    fn recorder() -> (Arc<dyn TransportListener>, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder(tx)), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("listener dropped")
    }

    /// Accept one socket, greet, echo one frame back, then close.
    async fn echo_server() -> (String, tokio::sync::oneshot::Receiver<Option<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (auth_tx, auth_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |request: &Request, response: Response| {
                let auth = request
                    .headers()
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = auth_tx.send(auth);
                Ok::<Response, ErrorResponse>(response)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            ws.send(Message::text("hello")).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    ws.send(Message::text(format!("echo:{}", text.as_str())))
                        .await
                        .unwrap();
                    break;
                }
            }
            ws.close(None).await.unwrap();
        });
        (format!("ws://{addr}"), auth_rx)
    }

    fn request(url: String) -> ConnectRequest {
        ConnectRequest {
            url,
            headers: vec![
                ("Authorization".to_string(), "Bearer abc".to_string()),
                ("X-Protocol-Version".to_string(), "2.0".to_string()),
            ],
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_remote_close() {
        let (url, auth) = echo_server().await;
        let transport = WebSocketTransport::new();
        let (listener, mut seen) = recorder();

        transport.connect(request(url), listener).await.unwrap();
        assert_eq!(auth.await.unwrap().as_deref(), Some("Bearer abc"));
        assert_eq!(next(&mut seen).await, Seen::Open);
        assert_eq!(next(&mut seen).await, Seen::Message("hello".to_string()));

        transport.send("ping".to_string()).unwrap();
        assert_eq!(
            next(&mut seen).await,
            Seen::Message("echo:ping".to_string())
        );
        assert!(matches!(next(&mut seen).await, Seen::Close(_)));
    }

    #[tokio::test]
    async fn test_local_close_does_not_notify() {
        let (url, _auth) = echo_server().await;
        let transport = WebSocketTransport::new();
        let (listener, mut seen) = recorder();

        transport.connect(request(url), listener).await.unwrap();
        assert_eq!(next(&mut seen).await, Seen::Open);
        transport.close();
        assert!(!transport.is_connected());
        assert_eq!(
            transport.send("late".to_string()),
            Err(TransportError::NotConnected)
        );

        // Only the greeting may still arrive; never a close.
        let rest = tokio::time::timeout(Duration::from_millis(200), async {
            let mut rest = Vec::new();
            while let Some(event) = seen.recv().await {
                rest.push(event);
            }
            rest
        })
        .await
        .unwrap_or_default();
        assert!(rest.iter().all(|e| !matches!(e, Seen::Close(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new();
        let (listener, _seen) = recorder();
        let result = transport
            .connect(request(format!("ws://{addr}")), listener)
            .await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert_eq!(
            transport.send("x".to_string()),
            Err(TransportError::NotConnected)
        );
    }
}
