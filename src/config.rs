//! Session configuration (spec §5, §9 "global debug/trace flags"): the
//! original's process-wide `#define`s and socket-read constants become a
//! config struct built once per session.

use std::time::Duration;

/// Default socket-read timeout (spec §5 "Timeouts").
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

/// Default cap on how many of a `BucketVector`'s older incomplete
/// sequences stay parked before reaping, independent of `atsc3_mmtp`'s
/// own fixed `REAP_WINDOW` (this one bounds per-channel queue depth, the
/// other bounds per-sub-flow bucket retention).
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Tunables for a receiving session.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverConfig {
    /// How long a channel's receive task waits on its packet source
    /// before re-checking for cancellation (spec §5 "Timeouts").
    pub socket_timeout: Duration,
    /// Bounded channel capacity between a channel's receive task and the
    /// session's join task.
    pub channel_queue_depth: usize,
    pub log_config: LogConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            channel_queue_depth: DEFAULT_QUEUE_DEPTH,
            log_config: LogConfig::default(),
        }
    }
}

/// Session-scoped replacement for the original's global debug/trace
/// flags (spec §9).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Logs every decoded header at `trace` level, not just drops/warnings.
    pub verbose_headers: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_socket_timeout() {
        let cfg = ReceiverConfig::default();
        assert_eq!(cfg.socket_timeout, Duration::from_secs(1));
        assert!(!cfg.log_config.verbose_headers);
    }
}
