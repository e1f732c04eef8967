use crate::constants::*;
use crate::transport::TraceConfig;
use std::time::Duration;

/// Fixed CAN bit rate of the Neurofield bus (500 kbit/s)
pub const PROTOCOL_BITRATE: u32 = 500_000;

/// Timing and adapter settings for a [`LinkManager`](crate::link::LinkManager).
///
/// The defaults are the protocol's fixed values. Tests shrink the durations to
/// zero; the tick budget and attempt counts keep their meaning either way.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub bitrate: u32,
    pub trace: TraceConfig,
    pub poll_interval: Duration,
    pub max_poll_ticks: u32,
    pub discovery_window: Duration,
    pub recovery_attempts: u32,
    pub recovery_pause: Duration,
    pub abort_repeats: usize,
    pub abort_settle: Duration,
    pub blink_pause: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bitrate: PROTOCOL_BITRATE,
            trace: TraceConfig::default(),
            poll_interval: POLL_INTERVAL,
            max_poll_ticks: MAX_POLL_TICKS,
            discovery_window: DISCOVERY_WINDOW,
            recovery_attempts: BUS_OFF_RECOVERY_ATTEMPTS,
            recovery_pause: BUS_OFF_RECOVERY_PAUSE,
            abort_repeats: ABORT_REPEATS,
            abort_settle: ABORT_SETTLE,
            blink_pause: BLINK_PAUSE,
        }
    }
}

impl LinkConfig {
    /// Same counts as the default, with every pause collapsed to zero.
    pub fn without_delays() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            discovery_window: Duration::ZERO,
            recovery_pause: Duration::ZERO,
            abort_settle: Duration::ZERO,
            blink_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}
