use std::sync::OnceLock;

use crate::ack::Acknowledgement;
use crate::packet::Packet;

/// Whether verbose protocol tracing is enabled, gated by the `RECDESC_DEBUG`
/// environment variable (checked once and cached). This is independent of
/// whatever level filtering a binary configures for the `tracing` subscriber
/// generally via `RUST_LOG` — it switches on a specific, chatty trace of the
/// dispatcher/reader/parallel protocol that would otherwise be too noisy to
/// leave keyed only to `TRACE` level.
fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("RECDESC_DEBUG").is_some_and(|v| !v.is_empty()))
}

pub(crate) fn trace_subscribe(cookie: u64) {
    if enabled() {
        tracing::trace!(cookie, "subscribed");
    }
}

pub(crate) fn trace_send<R: std::fmt::Debug>(packet: &Packet<R>) {
    if enabled() {
        tracing::trace!(offset = packet.offset, item = ?packet.item, eof = packet.eof, "broadcast");
    }
}

pub(crate) fn trace_ack(cookie: u64, ack: Acknowledgement) {
    if enabled() {
        tracing::trace!(cookie, ?ack, "acknowledged");
    }
}
