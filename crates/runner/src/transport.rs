// transport.rs
//
// WebSocket transport collaborator: the polling handshake that yields the
// session id cookie, then the upgraded socket. The core session only ever
// sees the channel pair this module bridges.

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use swarm_core::protocol::TransportEvent;

pub struct Connection {
    /// Session id assigned by the polling handshake; doubles as this
    /// client's participant id.
    pub sid: String,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    pub outbound: mpsc::UnboundedSender<String>,
}

pub async fn connect(uri: &str, origin: &str) -> Result<Connection> {
    let sid = fetch_session_id(origin).await?;

    let url = format!("{uri}/socket.io/?EIO=3&transport=websocket&sid={sid}");
    let mut request = url
        .into_client_request()
        .context("build websocket request")?;
    request
        .headers_mut()
        .insert(ORIGIN, origin.parse().context("origin header value")?);

    let (socket, _) = connect_async(request).await.context("websocket connect")?;
    let (mut write, mut read) = socket.split();

    let (event_tx, events) = mpsc::unbounded_channel();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    // The socket is open once the upgrade completes.
    event_tx.send(TransportEvent::Opened).ok();

    let reader_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    reader_tx.send(TransportEvent::Frame(text)).ok();
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    reader_tx.send(TransportEvent::Errored(err.to_string())).ok();
                    break;
                }
            }
        }
        reader_tx.send(TransportEvent::Closed).ok();
    });

    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(err) = write.send(Message::Text(frame)).await {
                warn!(%err, "websocket send failed");
                break;
            }
        }
    });

    Ok(Connection {
        sid,
        events,
        outbound,
    })
}

async fn fetch_session_id(origin: &str) -> Result<String> {
    let response = reqwest::get(format!("{origin}/socket.io/?EIO=3&transport=polling"))
        .await
        .context("polling handshake request")?;
    let sid = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_session_cookie)
        .ok_or_else(|| anyhow!("polling response carried no io session cookie"))?;
    debug!(%sid, "acquired session id");
    Ok(sid)
}

fn parse_session_cookie(header: &str) -> Option<String> {
    header
        .split(';')
        .next()?
        .trim()
        .strip_prefix("io=")
        .map(str::to_string)
}
