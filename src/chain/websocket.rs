use super::rpc::HEAD_CHANNEL_CAPACITY;
use crate::errors::BundleError;
use eyre::{Result, eyre};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// The part of a newHeads notification the scheduler needs; other header fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: String,
}

impl BlockHeader {
    /// Parse block number from hex string
    pub fn block_number(&self) -> Result<u64> {
        let num_str = self.number.trim_start_matches("0x");
        u64::from_str_radix(num_str, 16).map_err(|e| eyre!("Invalid block number format: {}", e))
    }
}

/// How a connection ended when it did not fail
enum SessionEnd {
    /// The consumer dropped its receiver; nobody needs heads anymore
    ReceiverDropped,
    /// The server closed the stream; worth reconnecting
    StreamClosed,
}

/// WebSocket manager for subscribing to blockchain events
pub struct WebSocketManager {
    rpc_url: String,
    connection_timeout: Duration,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl WebSocketManager {
    pub fn new(
        rpc_url: String,
        connection_timeout: Duration,
        max_reconnect_attempts: u32,
        reconnect_delay: Duration,
    ) -> Self {
        Self { rpc_url, connection_timeout, max_reconnect_attempts, reconnect_delay }
    }

    /// Start subscribing to newHeads events.
    ///
    /// Returns a receiver of head block numbers. The background task stops when the
    /// receiver is dropped, and the stream ends once reconnection attempts run out.
    pub async fn subscribe_new_heads(&self) -> Result<mpsc::Receiver<u64>, BundleError> {
        Url::parse(&self.rpc_url)
            .map_err(|e| BundleError::Configuration(format!("Invalid WebSocket URL: {}", e)))?;

        let (head_tx, head_rx) = mpsc::channel(HEAD_CHANNEL_CAPACITY);

        let rpc_url = self.rpc_url.clone();
        let connection_timeout = self.connection_timeout;
        let max_reconnect_attempts = self.max_reconnect_attempts;
        let reconnect_delay = self.reconnect_delay;

        tokio::spawn(async move {
            let mut reconnect_count = 0;

            loop {
                let failure = match Self::connect_and_subscribe(&rpc_url, connection_timeout, &head_tx).await {
                    Ok(SessionEnd::ReceiverDropped) => {
                        debug!("Head receiver dropped, closing WebSocket subscription");
                        break;
                    }
                    Ok(SessionEnd::StreamClosed) => eyre!("stream closed by server"),
                    Err(e) => e,
                };

                error!("WebSocket connection error: {}", failure);
                reconnect_count += 1;

                if reconnect_count >= max_reconnect_attempts {
                    error!("Max reconnection attempts reached, giving up");
                    break;
                }

                warn!("Attempting reconnection #{} in {:?}", reconnect_count, reconnect_delay);
                sleep(reconnect_delay).await;
            }
        });

        Ok(head_rx)
    }

    /// Connect to WebSocket and handle subscription
    async fn connect_and_subscribe(
        rpc_url: &str,
        connection_timeout: Duration,
        head_tx: &mpsc::Sender<u64>,
    ) -> Result<SessionEnd> {
        let url = Url::parse(rpc_url)?;
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = timeout(connection_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| eyre!("WebSocket connection timeout"))?
            .map_err(|e| eyre!("WebSocket connection failed: {}", e))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let subscribe_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newHeads"]
        });

        ws_sender.send(Message::Text(subscribe_request.to_string().into())).await?;

        let subscription_id = match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                let response: Value = serde_json::from_str(text.as_str())?;
                if let Some(result) = response.get("result") {
                    result.as_str().ok_or_else(|| eyre!("Invalid subscription ID format"))?.to_string()
                } else if let Some(error) = response.get("error") {
                    return Err(eyre!("Subscription error: {}", error));
                } else {
                    return Err(eyre!("Unexpected subscription response: {}", text));
                }
            }
            Some(Ok(msg)) => {
                return Err(eyre!("Unexpected message type during subscription: {:?}", msg));
            }
            Some(Err(e)) => {
                return Err(eyre!("WebSocket error during subscription: {}", e));
            }
            None => {
                return Err(eyre!("WebSocket closed during subscription"));
            }
        };

        info!("Subscribed to newHeads with ID: {}", subscription_id);

        loop {
            tokio::select! {
                ws_msg = ws_receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            match Self::handle_message(text.as_str(), head_tx) {
                                Ok(true) => {}
                                Ok(false) => return Ok(SessionEnd::ReceiverDropped),
                                Err(e) => warn!("Failed to handle WebSocket message: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("WebSocket closed by server");
                            return Ok(SessionEnd::StreamClosed);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(eyre!("WebSocket error: {}", e));
                        }
                        None => {
                            return Ok(SessionEnd::StreamClosed);
                        }
                    }
                }

                _ = head_tx.closed() => {
                    return Ok(SessionEnd::ReceiverDropped);
                }
            }
        }
    }

    /// Forwards a newHeads notification; `Ok(false)` once the receiver is gone.
    fn handle_message(text: &str, head_tx: &mpsc::Sender<u64>) -> Result<bool> {
        let message: Value = serde_json::from_str(text)?;

        let Some(result) = message.get("params").and_then(|params| params.get("result")) else {
            return Ok(true);
        };

        let header: BlockHeader = serde_json::from_value(result.clone())?;
        let number = header.block_number()?;
        debug!("Received new head: {}", number);

        match head_tx.try_send(number) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Head channel is full, dropping block {}", number);
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Ok(false),
        }
    }
}
