//! Leveled counters standing in for the original's macro-based
//! `ALC_RX_DEBUG`/`__ISOBMFF_JOINER_INFO`-style logging. A `Telemetry`
//! instance is cheap to clone (it's just `Arc`-shared atomics) and is
//! handed to every reassembler and to the joiner so packet- and
//! object-level error counts stay observable without turning every
//! drop into a propagated error (per spec §7's propagation policy).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    malformed_header: AtomicU64,
    unsupported_fec: AtomicU64,
    capacity_exhausted: AtomicU64,
    signalling_table_missing: AtomicU64,
    join_incomplete: AtomicU64,
    sink_closed: AtomicU64,
    moof_fallback: AtomicU64,
    objects_completed: AtomicU64,
    objects_incomplete: AtomicU64,
}

/// Session-scoped telemetry collaborator. Replaces the original's
/// process-wide debug/trace `#define`s with counters an application can
/// poll, and emits `log` records at the appropriate level as each event
/// happens.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    counters: Arc<Counters>,
}

macro_rules! counter_method {
    ($incr:ident, $read:ident, $field:ident, $level:expr, $msg:literal) => {
        pub fn $incr(&self) {
            self.counters.$field.fetch_add(1, Ordering::Relaxed);
            log::log!($level, $msg);
        }

        pub fn $read(&self) -> u64 {
            self.counters.$field.load(Ordering::Relaxed)
        }
    };
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    counter_method!(
        record_malformed_header,
        malformed_header_count,
        malformed_header,
        log::Level::Debug,
        "dropping packet: malformed header"
    );
    counter_method!(
        record_unsupported_fec,
        unsupported_fec_count,
        unsupported_fec,
        log::Level::Warn,
        "object closed with unsupported FEC encoding"
    );
    counter_method!(
        record_capacity_exhausted,
        capacity_exhausted_count,
        capacity_exhausted,
        log::Level::Error,
        "buffer capacity exhausted; channel degraded"
    );
    counter_method!(
        record_signalling_table_missing,
        signalling_table_missing_count,
        signalling_table_missing,
        log::Level::Debug,
        "no signalling table entry for presentation time lookup"
    );
    counter_method!(
        record_join_incomplete,
        join_incomplete_count,
        join_incomplete,
        log::Level::Debug,
        "join phase returned null; waiting for a later sequence"
    );
    counter_method!(
        record_sink_closed,
        sink_closed_count,
        sink_closed,
        log::Level::Info,
        "output sink is shutting down; will stop publishing"
    );
    counter_method!(
        record_moof_fallback,
        moof_fallback_count,
        moof_fallback,
        log::Level::Warn,
        "moof missing for requested sequence; reused last moof"
    );
    counter_method!(
        record_object_completed,
        objects_completed_count,
        objects_completed,
        log::Level::Debug,
        "transport object completed"
    );
    counter_method!(
        record_object_incomplete,
        objects_incomplete_count,
        objects_incomplete,
        log::Level::Warn,
        "transport object incomplete at session close"
    );
}
