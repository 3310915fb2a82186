//! WebSocket connection to the authority.
//!
//! A writer task forwards queued [`ClientMessage`]s in order; a reader task
//! decodes [`ServerMessage`]s, answers pending pulls and forwards pushes as
//! [`Notification`]s. Both tasks end when the socket closes.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::protocol::{ClientMessage, ServerMessage, StatePayload};
use super::{Authority, AuthorityError, AuthorityResult, BoxFuture, Intent, Notification};
use crate::state::{ScreenSize, SelectionState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<AuthorityResult<StatePayload>>;
type PendingReplies = Arc<Mutex<HashMap<u64, Reply>>>;

/// Authority reached over a WebSocket.
pub struct WsAuthority {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    pending: PendingReplies,
    next_request: Cell<u64>,
    /// Last viewport size reported, used when a payload omits `screen`.
    viewport: Cell<ScreenSize>,
    request_timeout: Duration,
}

impl WsAuthority {
    /// Connect to the authority at `url` (`ws://` or `wss://`).
    ///
    /// Returns the connection and the receiving end of its notification
    /// stream. Must be called inside a tokio runtime.
    pub async fn connect(
        url: &str,
        request_timeout: Duration,
    ) -> AuthorityResult<(Self, mpsc::UnboundedReceiver<Notification>)> {
        let parsed = Url::parse(url).map_err(|e| AuthorityError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(AuthorityError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        log::info!("Connecting to authority at {}", url);
        let (socket, response) = connect_async(url).await?;
        log::info!("Authority connected, status: {}", response.status());

        let (sink, stream) = socket.split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let pending = PendingReplies::default();

        tokio::spawn(write_loop(sink, outgoing_rx));
        tokio::spawn(read_loop(stream, pending.clone(), notify_tx));

        let authority = Self {
            outgoing,
            pending,
            next_request: Cell::new(1),
            viewport: Cell::new(ScreenSize::default()),
            request_timeout,
        };
        Ok((authority, notify_rx))
    }

    fn forget(&self, request_id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&request_id);
        }
    }
}

impl Authority for WsAuthority {
    fn get_selection_state(&self) -> BoxFuture<'_, AuthorityResult<SelectionState>> {
        Box::pin(async move {
            let request_id = self.next_request.get();
            self.next_request.set(request_id.wrapping_add(1));

            let (tx, rx) = oneshot::channel();
            self.pending
                .lock()
                .map_err(|e| AuthorityError::Transport(format!("Lock error: {}", e)))?
                .insert(request_id, tx);

            if self.outgoing.send(ClientMessage::GetState { request_id }).is_err() {
                self.forget(request_id);
                return Err(AuthorityError::Closed);
            }

            let payload = match tokio::time::timeout(self.request_timeout, rx).await {
                Ok(Ok(result)) => result?,
                Ok(Err(_)) => return Err(AuthorityError::Closed),
                Err(_) => {
                    self.forget(request_id);
                    return Err(AuthorityError::Timeout);
                }
            };

            Ok(payload.into_state(self.viewport.get()))
        })
    }

    fn send(&self, intent: Intent) -> AuthorityResult<()> {
        if let Intent::WindowSize(size) = intent {
            self.viewport.set(size);
        }
        self.outgoing
            .send(ClientMessage::from(intent))
            .map_err(|_| AuthorityError::Closed)
    }
}

async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
) {
    while let Some(msg) = outgoing.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to encode {:?}: {}", msg, e);
                continue;
            }
        };
        log::debug!("Authority sending: {}", json);
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            log::error!("Authority send error: {}", e);
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: SplitStream<Socket>,
    pending: PendingReplies,
    notify: mpsc::UnboundedSender<Notification>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(txt)) => {
                log::debug!("Authority received: {}", txt.as_str());
                match serde_json::from_str::<ServerMessage>(txt.as_str()) {
                    Ok(msg) => dispatch(msg, &pending, &notify),
                    Err(e) => log::warn!("Failed to parse authority message: {}", e),
                }
            }
            Ok(Message::Close(_)) => {
                log::info!("Authority sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("Authority read error: {}", e);
                break;
            }
        }
    }

    let orphaned: Vec<Reply> = match pending.lock() {
        Ok(mut pending) => pending.drain().map(|(_, reply)| reply).collect(),
        Err(_) => Vec::new(),
    };
    for reply in orphaned {
        let _ = reply.send(Err(AuthorityError::Closed));
    }
    log::info!("Authority connection closed");
}

/// Route one decoded message to its pending pull or to the notification stream.
fn dispatch(
    msg: ServerMessage,
    pending: &PendingReplies,
    notify: &mpsc::UnboundedSender<Notification>,
) {
    let take = |request_id: u64| pending.lock().ok().and_then(|mut p| p.remove(&request_id));

    match msg {
        ServerMessage::State { request_id, state } => match take(request_id) {
            Some(reply) => {
                let _ = reply.send(Ok(state));
            }
            None => log::debug!("Dropping late state answer {}", request_id),
        },
        ServerMessage::RequestFailed { request_id, message } => {
            if let Some(reply) = take(request_id) {
                let _ = reply.send(Err(AuthorityError::Rejected(message)));
            }
        }
        ServerMessage::Error { message } => log::warn!("Authority error: {}", message),
        other => {
            if let Some(notification) = other.notification() {
                if notify.send(notification).is_err() {
                    log::debug!("Notification {:?} dropped, engine gone", notification);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use tokio::net::TcpListener;

    fn payload() -> StatePayload {
        StatePayload {
            phase: Phase::Idle,
            bounds: None,
            screen: None,
        }
    }

    #[test]
    fn test_dispatch_answers_pending_request() {
        let pending = PendingReplies::default();
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = oneshot::channel();
        pending.lock().unwrap().insert(4, tx);

        dispatch(
            ServerMessage::State { request_id: 4, state: payload() },
            &pending,
            &notify_tx,
        );

        assert_eq!(rx.try_recv().unwrap().unwrap(), payload());
        assert!(pending.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_rejected_request() {
        let pending = PendingReplies::default();
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = oneshot::channel();
        pending.lock().unwrap().insert(1, tx);

        dispatch(
            ServerMessage::RequestFailed { request_id: 1, message: "busy".into() },
            &pending,
            &notify_tx,
        );

        assert!(matches!(rx.try_recv().unwrap(), Err(AuthorityError::Rejected(m)) if m == "busy"));
    }

    #[test]
    fn test_dispatch_forwards_notifications() {
        let pending = PendingReplies::default();
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        dispatch(ServerMessage::BeginCapture, &pending, &notify_tx);
        dispatch(ServerMessage::Error { message: "ignored".into() }, &pending, &notify_tx);
        dispatch(ServerMessage::Dismiss, &pending, &notify_tx);

        assert_eq!(notify_rx.try_recv().unwrap(), Notification::BeginCapture);
        assert_eq!(notify_rx.try_recv().unwrap(), Notification::Dismiss);
        assert!(notify_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_non_websocket_url() {
        let result = WsAuthority::connect("http://localhost:3030", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AuthorityError::InvalidUrl(_))));

        let result = WsAuthority::connect("not a url", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AuthorityError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_round_trip_with_local_authority() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let mut received = Vec::new();

            while let Some(Ok(Message::Text(txt))) = ws.next().await {
                let msg: ClientMessage = serde_json::from_str(txt.as_str()).unwrap();
                received.push(msg.clone());
                if let ClientMessage::GetState { request_id } = msg {
                    let reply = ServerMessage::State { request_id, state: payload() };
                    let json = serde_json::to_string(&reply).unwrap();
                    ws.send(Message::Text(json.into())).await.unwrap();
                    let json = serde_json::to_string(&ServerMessage::StateChanged).unwrap();
                    ws.send(Message::Text(json.into())).await.unwrap();
                    break;
                }
            }
            received
        });

        let url = format!("ws://{}", addr);
        let (authority, mut notifications) =
            WsAuthority::connect(&url, Duration::from_secs(5)).await.unwrap();

        let size = ScreenSize::new(1024.0, 768.0);
        authority.send(Intent::Ready).unwrap();
        authority.report_window_size(size).unwrap();

        let state = authority.get_selection_state().await.unwrap();
        assert_eq!(state, SelectionState::idle(size));
        assert_eq!(notifications.recv().await, Some(Notification::StateChanged));

        let received = server.await.unwrap();
        assert_eq!(
            received,
            vec![
                ClientMessage::Ready,
                ClientMessage::WindowSize { width: 1024.0, height: 768.0 },
                ClientMessage::GetState { request_id: 1 },
            ]
        );

        // The server hung up: the notification stream ends.
        assert_eq!(notifications.recv().await, None);
    }
}
