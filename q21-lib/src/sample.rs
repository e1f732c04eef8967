use crate::constants::*;
use std::fmt;
use zerocopy::byteorder::big_endian::I32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Payload of one AD frame: two 24 bit two's complement values, MSB first.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct AdFrameRaw {
    pub first: [u8; 3],
    pub second: [u8; 3],
}

impl AdFrameRaw {
    pub fn values(&self) -> [i32; 2] {
        [sign_extend_24(self.first), sign_extend_24(self.second)]
    }
}

/// `(signed(b0) << 16) | (b1 << 8) | b2`
pub fn sign_extend_24(bytes: [u8; 3]) -> i32 {
    ((bytes[0] as i8 as i32) << 16) | ((bytes[1] as i32) << 8) | bytes[2] as i32
}

/// Payload of one impedance frame.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ImpedanceFrameRaw {
    pub offset: I32,
    pub voltage: I32,
}

/// Raw offset/voltage readings of one impedance channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImpedancePair {
    pub offset: i32,
    pub voltage: i32,
}

impl From<ImpedanceFrameRaw> for ImpedancePair {
    fn from(raw: ImpedanceFrameRaw) -> Self {
        Self {
            offset: raw.offset.get(),
            voltage: raw.voltage.get(),
        }
    }
}

impl ImpedancePair {
    /// Electrode impedance in ohms, floored at [`MIN_IMPEDANCE_OHM`].
    ///
    /// Noise on the offset and tolerance of the line resistor can push the
    /// computed value below zero; those readings are reported as the floor.
    pub fn ohms(&self) -> f64 {
        let offset_v = counts_to_volts(self.offset);
        let measured_v = counts_to_volts(self.voltage);
        let ohms = (measured_v - offset_v) / INJECTED_CURRENT_A - LINE_RESISTANCE_OHM;
        if ohms <= MIN_IMPEDANCE_OHM { MIN_IMPEDANCE_OHM } else { ohms }
    }
}

fn counts_to_volts(raw: i32) -> f64 {
    raw as f64 * IMPEDANCE_VREF / IMPEDANCE_AVERAGED_SAMPLES / ADC_FULL_SCALE
}

/// One complete EEG sample in converter counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EegSample {
    pub channels: [i32; EEG_CHANNELS],
    /// Arrival time of the first frame of the sample, in microseconds.
    pub timestamp_us: u64,
}

/// One complete EEG sample in microvolts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EegSampleUv {
    pub channels: [f64; EEG_CHANNELS],
    pub timestamp_us: u64,
}

impl fmt::Display for EegSampleUv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>12}", self.timestamp_us)?;
        for value in &self.channels {
            write!(f, " {value:>9.2}")?;
        }
        Ok(())
    }
}

/// Impedance of every channel, in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImpedanceSample {
    pub ohms: [f64; IMPEDANCE_SEQUENCE_LEN],
    /// False when the read was cancelled before all channels arrived; missing
    /// channels then hold the value of a zero reading.
    pub complete: bool,
}

impl ImpedanceSample {
    pub fn from_pairs(pairs: &[ImpedancePair], complete: bool) -> Self {
        let mut ohms = [ImpedancePair::default().ohms(); IMPEDANCE_SEQUENCE_LEN];
        for (slot, pair) in ohms.iter_mut().zip(pairs) {
            *slot = pair.ohms();
        }
        Self { ohms, complete }
    }
}

impl fmt::Display for ImpedanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.ohms.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:.1}k", value / 1000.0)?;
        }
        if !self.complete {
            write!(f, " (partial)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend_24([0x01, 0x02, 0x03]), 0x010203);
        assert_eq!(sign_extend_24([0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(sign_extend_24([0xFF, 0x00, 0x00]), -65536);
        assert_eq!(sign_extend_24([0x80, 0x00, 0x00]), -8_388_608);
        assert_eq!(sign_extend_24([0x7F, 0xFF, 0xFF]), 8_388_607);
    }

    #[test]
    fn impedance_frame_is_big_endian() {
        let raw = ImpedanceFrameRaw::ref_from_bytes(&[0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00]).unwrap();
        let pair = ImpedancePair::from(*raw);
        assert_eq!(pair.offset, -2);
        assert_eq!(pair.voltage, 256);
    }

    #[test]
    fn impedance_floor() {
        // measured voltage equal to the drop over the line resistor -> 0 ohm
        let line_drop_counts = INJECTED_CURRENT_A * LINE_RESISTANCE_OHM * ADC_FULL_SCALE * IMPEDANCE_AVERAGED_SAMPLES
            / IMPEDANCE_VREF;
        let pair = ImpedancePair {
            offset: 0,
            voltage: line_drop_counts.round() as i32,
        };
        assert_eq!(pair.ohms(), MIN_IMPEDANCE_OHM);
        assert_eq!(ImpedancePair::default().ohms(), MIN_IMPEDANCE_OHM);
    }

    #[test]
    fn impedance_above_floor() {
        // 10 kOhm electrode: (10k + 12k) * 6 uA = 132 mV
        let counts = 0.132 * ADC_FULL_SCALE * IMPEDANCE_AVERAGED_SAMPLES / IMPEDANCE_VREF;
        let pair = ImpedancePair {
            offset: 0,
            voltage: counts.round() as i32,
        };
        assert!((pair.ohms() - 10_000.0).abs() < 1.0, "got {}", pair.ohms());
    }

    #[test]
    fn partial_impedance_sample_keeps_floor() {
        let sample = ImpedanceSample::from_pairs(&[], false);
        assert!(!sample.complete);
        assert!(sample.ohms.iter().all(|&ohms| ohms == MIN_IMPEDANCE_OHM));
    }
}
