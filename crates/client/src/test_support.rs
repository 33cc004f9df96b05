//! Helpers for driving a headless `VirtualDom` in unit tests.

use std::time::Duration;

use dioxus::prelude::*;

/// Run queued tasks and pending renders until the dom goes quiet.
pub(crate) async fn settle(dom: &mut VirtualDom) {
    for _ in 0..3 {
        tokio::select! {
            _ = dom.wait_for_work() => {}
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        let _ = dom.render_immediate_to_vec();
    }
}
