//! Desktop driver on top of tokio-tungstenite.

use futures_channel::mpsc::unbounded;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::{IDLE_RETRY_MS, OPEN_TIMEOUT_MS};
use crate::channel::{ChannelAdapter, ConnectionState, ReconnectConfig, Reconnector};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start the connection loop on the current tokio runtime.
pub fn spawn_transport(
    adapter: ChannelAdapter,
    url_builder: impl Fn() -> Option<String> + Send + Sync + 'static,
    config: ReconnectConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut reconnector = Reconnector::new(config);

        loop {
            if adapter.is_shut_down() {
                break;
            }

            let Some(url) = url_builder() else {
                adapter.set_state(ConnectionState::Closed);
                sleep(Duration::from_millis(IDLE_RETRY_MS as u64)).await;
                continue;
            };

            adapter.set_state(reconnector.begin_connect());
            let handshake = timeout(
                Duration::from_millis(OPEN_TIMEOUT_MS as u64),
                connect_async(url.as_str()),
            );
            match handshake.await {
                Ok(Ok((socket, _response))) => {
                    reconnector.connected();
                    crate::log_info!("Realtime channel connected");
                    run_session(&adapter, socket).await;
                    crate::log_info!("Realtime channel closed");
                }
                Ok(Err(e)) => {
                    crate::log_error!("Realtime channel connect failed: {}", e);
                }
                Err(_) => {
                    crate::log_error!(
                        "Realtime channel connect timed out after {}ms",
                        OPEN_TIMEOUT_MS
                    );
                }
            }

            if adapter.is_shut_down() {
                break;
            }

            let next = reconnector.disconnected();
            adapter.set_state(next);
            if reconnector.has_failed() {
                crate::log_error!("Realtime channel giving up after {} attempts", reconnector.attempt());
                break;
            }

            let delay = reconnector.remaining_ms();
            crate::log_info!(
                "Reconnecting in {}ms (attempt {})",
                delay,
                reconnector.attempt()
            );
            sleep(Duration::from_millis(delay)).await;
        }

        crate::log_debug!("Realtime transport loop stopped");
    })
}

/// Pump one open socket until either side closes it.
async fn run_session(adapter: &ChannelAdapter, socket: Socket) {
    let (mut write, mut read) = socket.split();
    let (sink, mut outgoing) = unbounded::<String>();

    let Some(generation) = adapter.attach_transport(sink) else {
        let _ = write.close().await;
        return;
    };

    loop {
        tokio::select! {
            next = outgoing.next() => match next {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        crate::log_error!("Realtime send failed: {}", e);
                        break;
                    }
                }
                None => {
                    // Adapter replaced or shut us down.
                    let _ = write.close().await;
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    adapter.handle_frame(text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    crate::log_error!("Realtime read error: {}", e);
                    break;
                }
            },
        }
    }

    adapter.detach_transport(generation);
}
