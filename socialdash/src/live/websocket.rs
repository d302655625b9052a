use super::{LiveError, LiveEvent, PushConnector, PushLink};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Websocket transport carrying JSON `{"event", "data"}` text frames. The
/// bearer credential goes in the handshake's `Authorization` header.
#[derive(Default, Debug, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, url: &str, token: &str) -> Result<PushLink, LiveError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut to_server) = mpsc::unbounded_channel::<LiveEvent>();
        let (to_client, incoming) = mpsc::unbounded_channel::<LiveEvent>();

        tokio::spawn(async move {
            while let Some(event) = to_server.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping unserialisable {} event: {}", event.event, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("Websocket write failed: {}", e);
                    break;
                }
            }
            if let Err(e) = sink.close().await {
                debug!("Websocket close failed: {}", e);
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<LiveEvent>(&text) {
                        Ok(event) => {
                            if to_client.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Ignoring malformed frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Websocket read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(PushLink { outgoing, incoming })
    }
}
