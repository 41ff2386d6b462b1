//! WebSocket client for the order book update stream.
//!
//! One connection carries the updates of one pair. After
//! [`WebSocketClient::stream_updates`] the server confirms with a
//! `subscribed` frame and then sends `update` frames in sequence order:
//!
//! ```json
//! {"type":"update","sequence":42,"trade_updates":[{"order_id":7,"base_e8":100}]}
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bookstream::client::WebSocketClient;
//! use bookstream::Config;
//!
//! # async fn example() -> bookstream::Result<()> {
//! let config = Config::new("localhost:8080", "XBTZAR");
//! let mut ws = WebSocketClient::connect(&config).await?;
//! ws.stream_updates("XBTZAR").await?;
//!
//! while let Some(update) = ws.next().await {
//!     let update = update?;
//!     println!("sequence {}", update.sequence);
//! }
//! # Ok(())
//! # }
//! ```

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::error::{ApiError, Error};
use crate::types::messages::{StreamParams, WsCommand, WsMessage};
use crate::types::Update;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for a single pair's update stream
///
/// # Thread Safety
///
/// This client is NOT thread-safe. The session moves it into the ingestion
/// task, which is its only user.
#[derive(Debug)]
pub struct WebSocketClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    message_id: u64,
    pair: Option<String>,
}

impl WebSocketClient {
    /// Connect to the streamer WebSocket endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not form a URL or the handshake
    /// fails.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let url = config.websocket_url()?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (write, read) = ws_stream.split();
        info!(url = %url, "WebSocket connected");

        Ok(Self {
            write,
            read,
            message_id: 1,
            pair: None,
        })
    }

    /// Send a command to the WebSocket server
    async fn send_command(&mut self, cmd: WsCommand) -> Result<u64, Error> {
        let msg_id = self.message_id;
        let json = serde_json::to_string(&cmd)?;
        trace!(frame = %json, "Sending WebSocket frame");
        self.write.send(Message::Text(json)).await?;
        self.message_id += 1;
        Ok(msg_id)
    }

    /// Get the pair being streamed, once requested
    pub fn pair(&self) -> Option<&str> {
        self.pair.as_deref()
    }

    /// Ask the server to stream updates for a pair
    ///
    /// # Returns
    ///
    /// The message ID of the request (echoed in the `subscribed` frame)
    pub async fn stream_updates(&mut self, pair: &str) -> Result<u64, Error> {
        let cmd = WsCommand::StreamUpdates {
            id: self.message_id,
            params: StreamParams {
                pair: pair.to_string(),
            },
        };
        let id = self.send_command(cmd).await?;
        self.pair = Some(pair.to_string());
        Ok(id)
    }

    /// Receive the next update.
    ///
    /// Pings are answered and confirmation frames skipped along the way.
    ///
    /// # Returns
    ///
    /// The next update, `None` once the server closes the connection, or an
    /// error for a broken socket, an undecodable frame or an `error` frame.
    pub async fn next(&mut self) -> Option<Result<Update, Error>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => {
                    trace!(frame = %text, "Received WebSocket frame");
                    match decode_frame(&text) {
                        Ok(Some(update)) => return Some(Ok(update)),
                        Ok(None) => continue,
                        Err(e) => return Some(Err(e)),
                    }
                }
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.write.send(Message::Pong(data)).await {
                        return Some(Err(e.into()));
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    return None;
                }
                Ok(_) => {
                    // Binary, Pong and raw frames carry nothing for us
                    continue;
                }
                Err(e) => {
                    return Some(Err(e.into()));
                }
            }
        }
    }

    /// Close the WebSocket connection
    pub async fn close(&mut self) -> Result<(), Error> {
        self.write.close().await?;
        Ok(())
    }
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for frames that carry no update.
pub(crate) fn decode_frame(text: &str) -> Result<Option<Update>, Error> {
    match serde_json::from_str::<WsMessage>(text)? {
        WsMessage::Update(update) => Ok(Some(update)),
        WsMessage::Subscribed(msg) => {
            debug!(pair = %msg.pair, id = ?msg.id, "Update stream confirmed");
            Ok(None)
        }
        WsMessage::Error(msg) => {
            let error = match msg.code {
                Some(code) => ApiError::with_code(0, code, msg.message),
                None => ApiError::new(0, msg.message),
            };
            Err(Error::Api(error))
        }
    }
}
