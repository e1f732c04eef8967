// Protocol constants for the Neurofield Q21 family

use std::time::Duration;

/// Mask for a 29 bit extended identifier
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Mask for an 11 bit standard identifier
pub const STANDARD_ID_MASK: u32 = 0x07FF;

/// Identifier bit set on every device-to-host frame
pub const SLAVE_TO_HOST_BIT: u32 = 1 << 24;

/// Classic CAN carries at most 8 data bytes
pub const MAX_FRAME_PAYLOAD: usize = 8;

/// Number of EEG channels in one sample
pub const EEG_CHANNELS: usize = 20;

/// Frames per AD sample (one primary + 9 continuations)
pub const AD_SEQUENCE_LEN: usize = 10;

/// Significant data bytes in an AD frame (two 24 bit values)
pub const AD_FRAME_SIZE: usize = 6;

/// Frames per impedance sample (one per channel)
pub const IMPEDANCE_SEQUENCE_LEN: usize = 20;

/// Data bytes in an impedance frame (offset + voltage, 32 bit each)
pub const IMPEDANCE_FRAME_SIZE: usize = 8;

/// Message type used to switch between EEG and impedance measurement
pub const MSG_SWITCH_MODE: u8 = 0x20;

/// Message type that starts AD streaming for a number of samples
pub const MSG_START_STREAMING: u8 = 0x03;

/// Message type that stops streaming
pub const MSG_ABORT: u8 = 0xFF;

/// Device sampling rate in Hz
pub const NEUROFIELD_SAMPLING_RATE: f64 = 256.0;

/// Samples requested by a default EEG start: 8 hours at 256 Hz
pub const DEFAULT_STREAM_SAMPLES: u32 = 256 * 60 * 60 * 8;

/// Samples requested per blink round (~400 ms)
pub const BLINK_SAMPLES: u32 = 100;

/// Number of blink rounds
pub const BLINK_ROUNDS: usize = 3;

/// Current injected on each electrode while measuring impedance (6 µA)
pub const INJECTED_CURRENT_A: f64 = 6e-6;

/// Total resistance on the board along the impedance measurement line
pub const LINE_RESISTANCE_OHM: f64 = 12_000.0;

/// Impedance readings at or below this value are reported as exactly this
pub const MIN_IMPEDANCE_OHM: f64 = 1_000.0;

/// ADC reference voltage used by the impedance front end
pub const IMPEDANCE_VREF: f64 = 4.5;

/// Samples averaged by the device per impedance reading
pub const IMPEDANCE_AVERAGED_SAMPLES: f64 = 15.0;

/// Full scale of the 24 bit converter (2^23)
pub const ADC_FULL_SCALE: f64 = 8_388_608.0;

/// Default receive poll granularity
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls before a blocking receive gives up (~1.4 s)
pub const MAX_POLL_TICKS: u32 = 1400;

/// Time allowed for every device on the bus to answer the discovery query
pub const DISCOVERY_WINDOW: Duration = Duration::from_secs(1);

/// Bus-off recovery attempts before giving up
pub const BUS_OFF_RECOVERY_ATTEMPTS: u32 = 30;

/// Pause after each deinitialize/initialize step of bus-off recovery
pub const BUS_OFF_RECOVERY_PAUSE: Duration = Duration::from_millis(10);

/// Stop requests sent per abort
pub const ABORT_REPEATS: usize = 50;

/// Pause between the last stop request and the buffer reset
pub const ABORT_SETTLE: Duration = Duration::from_millis(100);

/// Pause between blink rounds
pub const BLINK_PAUSE: Duration = Duration::from_millis(400);

/// Maximum trace file size in megabytes
pub const TRACE_FILE_SIZE_MB: u32 = 5;
