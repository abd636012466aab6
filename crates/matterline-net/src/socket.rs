//! The persistent event socket.
//!
//! [`spawn_socket`] opens the websocket, authenticates, and runs a read
//! loop in a dedicated tokio task. Decoded events flow out over a typed
//! notification channel; a command channel closes the task. Reconnect
//! policy is the client's business, not this module's: the task reports
//! `Disconnected` and terminates.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use matterline_shared::constants::{API_PREFIX, SOCKET_AUTH_ACTION};
use matterline_shared::events::{EventEnvelope, ServerEvent};

use crate::error::Result;

/// Commands sent *into* the socket task.
#[derive(Debug)]
pub enum SocketCommand {
    /// Close the connection and terminate the task.
    Close,
}

/// Notifications sent *from* the socket task to the client.
#[derive(Debug)]
pub enum SocketNotification {
    /// The connection is open and the authentication challenge was sent.
    Connected,
    /// One decoded real-time event.
    Event(ServerEvent),
    /// The connection is gone; the task has terminated.
    Disconnected,
}

/// Derive the websocket endpoint from the login domain.
fn socket_url(domain: &str) -> String {
    let trimmed = domain.trim_end_matches('/');
    let (scheme, host) = match trimmed.split_once("://") {
        Some(("http", host)) | Some(("ws", host)) => ("ws", host),
        Some((_, host)) => ("wss", host),
        None => ("wss", trimmed),
    };
    format!("{scheme}://{host}{API_PREFIX}/websocket")
}

/// Connect the event socket and spawn its read loop.
///
/// Returns the command sender and the notification receiver. The task ends
/// after a `Close` command or when the server side goes away; either way a
/// final `Disconnected` notification is delivered.
pub async fn spawn_socket(
    domain: &str,
    token: &str,
) -> Result<(
    mpsc::Sender<SocketCommand>,
    mpsc::Receiver<SocketNotification>,
)> {
    let endpoint = socket_url(domain);
    Url::parse(&endpoint)?;

    let (mut stream, _response) = connect_async(endpoint.as_str()).await?;
    info!(endpoint = %endpoint, "event socket connected");

    let challenge = serde_json::json!({
        "seq": 1,
        "action": SOCKET_AUTH_ACTION,
        "data": { "token": token },
    });
    stream.send(Message::Text(challenge.to_string())).await?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SocketCommand>(16);
    let (notif_tx, notif_rx) = mpsc::channel::<SocketNotification>(256);

    tokio::spawn(async move {
        let _ = notif_tx.send(SocketNotification::Connected).await;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SocketCommand::Close) | None => {
                            debug!("event socket close requested");
                            let _ = stream.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = decode_frame(&text) {
                                if notif_tx.send(SocketNotification::Event(event)).await.is_err() {
                                    // receiver gone, nobody left to tell
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            info!("event socket closed by server");
                            break;
                        }
                        Some(Ok(other)) => {
                            trace!(?other, "ignoring non-text frame");
                        }
                        Some(Err(error)) => {
                            warn!(%error, "event socket read failed");
                            break;
                        }
                    }
                }
            }
        }

        let _ = notif_tx.send(SocketNotification::Disconnected).await;
        debug!("event socket task terminated");
    });

    Ok((cmd_tx, notif_rx))
}

/// Decode one text frame. Frames without an event name are command replies
/// (`{"status":"OK","seq_reply":...}`) and are dropped; undecodable frames
/// are logged and skipped rather than killing the connection.
fn decode_frame(text: &str) -> Option<ServerEvent> {
    let envelope: EventEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(%error, "undecodable socket frame skipped");
            return None;
        }
    };

    if envelope.event.is_empty() {
        trace!(seq = envelope.seq, "socket command reply");
        return None;
    }

    Some(ServerEvent::decode(&envelope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_maps_schemes() {
        assert_eq!(
            socket_url("chat.example.org"),
            "wss://chat.example.org/api/v4/websocket"
        );
        assert_eq!(
            socket_url("https://chat.example.org/"),
            "wss://chat.example.org/api/v4/websocket"
        );
        assert_eq!(
            socket_url("http://localhost:8065"),
            "ws://localhost:8065/api/v4/websocket"
        );
    }

    #[test]
    fn command_replies_are_dropped() {
        assert!(decode_frame(r#"{"status":"OK","seq_reply":1}"#).is_none());
        assert!(decode_frame("not json at all").is_none());
    }

    #[test]
    fn event_frames_decode() {
        let frame = r#"{
            "event": "channel_viewed",
            "data": {"channel_id": "c1"},
            "broadcast": {},
            "seq": 5
        }"#;
        match decode_frame(frame) {
            Some(ServerEvent::ChannelViewed { channel_id }) => {
                assert_eq!(channel_id.as_str(), "c1");
            }
            other => panic!("expected ChannelViewed, got {other:?}"),
        }
    }
}
