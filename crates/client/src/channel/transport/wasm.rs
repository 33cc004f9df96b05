//! Browser driver on top of `web_sys::WebSocket`.

use std::cell::RefCell;
use std::rc::Rc;

use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use futures_util::StreamExt;
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CloseEvent, ErrorEvent, Event, MessageEvent, WebSocket};

use super::{IDLE_RETRY_MS, OPEN_TIMEOUT_MS};
use crate::channel::{ChannelAdapter, ConnectionState, ReconnectConfig, Reconnector};

const OPEN_POLL_MS: u32 = 10;

/// Start the connection loop on the browser event loop.
pub fn spawn_transport(
    adapter: ChannelAdapter,
    url_builder: impl Fn() -> Option<String> + 'static,
    config: ReconnectConfig,
) {
    spawn_local(async move {
        let mut reconnector = Reconnector::new(config);

        loop {
            if adapter.is_shut_down() {
                break;
            }

            let Some(url) = url_builder() else {
                adapter.set_state(ConnectionState::Closed);
                TimeoutFuture::new(IDLE_RETRY_MS).await;
                continue;
            };

            adapter.set_state(reconnector.begin_connect());
            match open_socket(&adapter, &url).await {
                Ok(socket) => {
                    reconnector.connected();
                    crate::log_info!("Realtime channel connected");
                    run_session(&adapter, socket).await;
                    crate::log_info!("Realtime channel closed");
                }
                Err(reason) => {
                    crate::log_error!("Realtime channel connect failed: {}", reason);
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

            let delay = reconnector.remaining_ms().min(u32::MAX as u64) as u32;
            crate::log_info!(
                "Reconnecting in {}ms (attempt {})",
                delay,
                reconnector.attempt()
            );
            TimeoutFuture::new(delay).await;
        }

        crate::log_debug!("Realtime transport loop stopped");
    });
}

/// An open browser socket plus the JS callbacks bound to it. Dropping it
/// unbinds the callbacks and closes the socket.
struct BrowserSocket {
    ws: WebSocket,
    closed: UnboundedReceiver<()>,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
    _on_error: Closure<dyn FnMut(ErrorEvent)>,
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);
        let _ = self.ws.close();
    }
}

async fn open_socket(adapter: &ChannelAdapter, url: &str) -> Result<BrowserSocket, String> {
    let ws = WebSocket::new(url).map_err(|e| format!("Failed to create WebSocket: {:?}", e))?;

    let opened = Rc::new(RefCell::new(false));
    let failure = Rc::new(RefCell::new(None::<String>));
    let (close_tx, closed) = unbounded::<()>();

    let opened_flag = opened.clone();
    let on_open = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
        *opened_flag.borrow_mut() = true;
    });

    let adapter_for_message = adapter.clone();
    let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |e: MessageEvent| {
        if let Some(text) = e.data().as_string() {
            adapter_for_message.handle_frame(&text);
        }
    });

    let failure_on_close = failure.clone();
    let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |e: CloseEvent| {
        let reason = if e.reason().is_empty() {
            format!("Code {}", e.code())
        } else {
            e.reason()
        };
        crate::log_info!("WebSocket onclose: {}", reason);
        failure_on_close.borrow_mut().get_or_insert(reason);
        let _ = close_tx.unbounded_send(());
    });

    let failure_on_error = failure.clone();
    let on_error = Closure::<dyn FnMut(ErrorEvent)>::new(move |_: ErrorEvent| {
        failure_on_error
            .borrow_mut()
            .get_or_insert_with(|| "WebSocket error".to_string());
    });

    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
    ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    let socket = BrowserSocket {
        ws,
        closed,
        _on_open: on_open,
        _on_message: on_message,
        _on_close: on_close,
        _on_error: on_error,
    };

    let mut waited = 0;
    while waited < OPEN_TIMEOUT_MS {
        if *opened.borrow() {
            return Ok(socket);
        }
        if let Some(reason) = failure.borrow().clone() {
            return Err(reason);
        }
        TimeoutFuture::new(OPEN_POLL_MS).await;
        waited += OPEN_POLL_MS;
    }

    Err("Connection timeout".to_string())
}

async fn run_session(adapter: &ChannelAdapter, mut socket: BrowserSocket) {
    let (sink, mut outgoing) = unbounded::<String>();
    let Some(generation) = adapter.attach_transport(sink) else {
        return;
    };

    loop {
        futures_util::select! {
            next = outgoing.next() => match next {
                Some(text) => {
                    if let Err(e) = socket.ws.send_with_str(&text) {
                        crate::log_error!("Realtime send failed: {:?}", e);
                    }
                }
                None => break,
            },
            _ = socket.closed.next() => break,
        }
    }

    adapter.detach_transport(generation);
}
