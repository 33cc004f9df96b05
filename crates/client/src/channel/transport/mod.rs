//! Socket drivers feeding a [`ChannelAdapter`](super::ChannelAdapter).
//!
//! Both drivers run the same loop: build the URL, connect, attach a fresh
//! outbound queue to the adapter, pump frames until the socket closes,
//! detach, then wait out the backoff scheduled by the
//! [`Reconnector`](super::Reconnector). The loop ends when the adapter is
//! shut down or the retry budget is spent.

/// Wait before asking the URL builder again when it has nothing to offer
/// (e.g. no session yet). Does not count as a reconnect attempt.
const IDLE_RETRY_MS: u32 = 1000;

/// Give up on a socket that has not finished opening after this long.
const OPEN_TIMEOUT_MS: u32 = 5000;

#[cfg(target_arch = "wasm32")]
mod wasm;
#[cfg(target_arch = "wasm32")]
pub use wasm::spawn_transport;

#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(not(target_arch = "wasm32"))]
pub use native::spawn_transport;
