//! Per-connection handler: frame decoding and call dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Split the socket; a writer task owns the sending half
//!   2. Loop: receive a frame → decode → spawn a task for the call
//!   3. Each call task sends its reply (or, for `Join`, its stream of
//!      replies) to the writer, tagged with the request id
//!
//! Calls run concurrently because `WaitNight` and `Vote` block until the
//! other three players arrive; one blocked call must not hold up the rest
//! of the connection.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use nightfall_protocol::{
    Call, Codec, JsonCodec, PlayerName, Reply, RequestFrame, ResponseFrame,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{MafiaService, NightfallError};

/// Replies queued for one connection before call tasks start waiting.
const OUTBOUND_CAPACITY: usize = 64;

type Outbound = mpsc::Sender<ResponseFrame>;

/// Drop guard that takes a connection's players out of the lobby when the
/// connection ends.
///
/// `Drop` is synchronous, so the async leave runs in a spawned task.
/// Players whose cohort already sealed get `NotWaiting`, which is ignored.
struct LobbyGuard {
    conn_id: u64,
    joined: Arc<Mutex<Vec<PlayerName>>>,
    service: Arc<MafiaService>,
}

impl Drop for LobbyGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let joined = Arc::clone(&self.joined);
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            for player in joined.lock().await.drain(..) {
                if service.leave(&player).await.is_ok() {
                    tracing::info!(conn_id, %player, "left lobby on disconnect");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    service: Arc<MafiaService>,
    conn_id: u64,
) -> Result<(), NightfallError> {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<ResponseFrame>(OUTBOUND_CAPACITY);

    tokio::spawn(async move {
        let codec = JsonCodec;
        while let Some(frame) = rx.recv().await {
            let bytes = match codec.encode(&frame) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(conn_id, error = %e, "failed to encode reply");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                tracing::debug!(conn_id, error = %e, "send failed");
                break;
            }
        }
    });

    let guard = LobbyGuard {
        conn_id,
        joined: Arc::new(Mutex::new(Vec::new())),
        service: Arc::clone(&service),
    };

    let codec = JsonCodec;
    let result = loop {
        let data = match stream.next().await {
            Some(Ok(Message::Binary(data))) => data.to_vec(),
            Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!(conn_id, "connection closed cleanly");
                break Ok(());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Err(NightfallError::from(e)),
        };

        let frame: RequestFrame = match codec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(conn_id, error = %e, "failed to decode frame");
                let reply = NightfallError::from(e).to_reply();
                let _ = tx.send(ResponseFrame { id: 0, reply }).await;
                continue;
            }
        };

        tokio::spawn(dispatch(
            frame,
            Arc::clone(&service),
            tx.clone(),
            Arc::clone(&guard.joined),
        ));
    };

    // Call tasks still blocked at a barrier keep their own senders; the
    // writer ends once the last of them finishes.
    drop(tx);
    drop(guard);
    result
}

/// Runs one call and sends its reply (or replies) to the writer.
async fn dispatch(
    frame: RequestFrame,
    service: Arc<MafiaService>,
    tx: Outbound,
    joined: Arc<Mutex<Vec<PlayerName>>>,
) {
    let RequestFrame { id, call } = frame;
    tracing::debug!(id, op = call.op(), player = %call.player(), "call received");

    match call {
        Call::Join { player } => {
            joined.lock().await.push(player.clone());
            let mut members = match service.join(player).await {
                Ok(members) => members,
                Err(e) => {
                    let _ = tx.send(ResponseFrame { id, reply: e.to_reply() }).await;
                    return;
                }
            };

            while let Some(members) = members.next().await {
                let reply = Reply::Lobby { members };
                if tx.send(ResponseFrame { id, reply }).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(ResponseFrame { id, reply: Reply::LobbyClosed }).await;
        }
        call => {
            let reply = service.call(call).await;
            if let Reply::Error { code, message } = &reply {
                tracing::debug!(id, code, %message, "call failed");
            }
            let _ = tx.send(ResponseFrame { id, reply }).await;
        }
    }
}
