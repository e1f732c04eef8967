use crate::constants::{EXTENDED_ID_MASK, MAX_FRAME_PAYLOAD, STANDARD_ID_MASK};
use crate::error::Q21Error;
use bytes::Bytes;
use modular_bitfield::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Layout of the 25 significant bits of a Neurofield extended identifier.
///
/// Fields are listed LSB first, so `message_type` occupies bits 7:0 and the
/// direction flag sits on bit 24.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanId {
    pub message_type: u8,
    pub serial: u8,
    pub module_type: u8,
    pub slave_to_host: bool,
    #[skip]
    unused: B7,
}

impl CanId {
    pub fn from_raw(id: u32) -> Self {
        CanId::from_bytes(id.to_le_bytes())
    }

    pub fn raw(&self) -> u32 {
        u32::from_le_bytes(self.into_bytes())
    }
}

/// Module codes carried in bits 23:16 of the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum DeviceType {
    /// Host computer
    Host = 0x00,
    /// 20 channel EEG, Rev A
    EEG20RevA = 0xA1,
    /// 20 channel EEG, Rev B
    EEG20RevB = 0xA2,
    /// 21 channel EEG
    EEG21 = 0xA3,
    /// 21 channel EEG, Rev A
    EEG21RevA = 0xA4,
    /// FPGA-less Q21
    EEG21RevK = 0xA5,
}

impl DeviceType {
    pub fn is_eeg(&self) -> bool {
        !matches!(self, DeviceType::Host)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum MessageType {
    CANBusQuery = 0,
    SendAtoDData = 3,
    SendAtoDDataMsg2 = 5,
    SendAtoDDataMsg3 = 6,
    SendAtoDDataMsg4 = 7,
    SendAtoDDataMsg5 = 8,
    SendAtoDDataMsg6 = 9,
    SendAtoDDataMsg7 = 10,
    SendAtoDDataMsg8 = 11,
    SendAtoDDataMsg9 = 12,
    SendAtoDDataMsg10 = 13,

    ImpedanceCh1 = 0xA0,
    ImpedanceCh2 = 0xA1,
    ImpedanceCh3 = 0xA2,
    ImpedanceCh4 = 0xA3,
    ImpedanceCh5 = 0xA4,
    ImpedanceCh6 = 0xA5,
    ImpedanceCh7 = 0xA6,
    ImpedanceCh8 = 0xA7,
    ImpedanceCh9 = 0xA8,
    ImpedanceCh10 = 0xA9,
    ImpedanceCh11 = 0xAA,
    ImpedanceCh12 = 0xAB,
    ImpedanceCh13 = 0xAC,
    ImpedanceCh14 = 0xAD,
    ImpedanceCh15 = 0xAE,
    ImpedanceCh16 = 0xAF,
    ImpedanceCh17 = 0xB0,
    ImpedanceCh18 = 0xB1,
    ImpedanceCh19 = 0xB2,
    ImpedanceCh20 = 0xB3,

    Abort = 0xFF,
}

impl MessageType {
    /// AD data and impedance frames; everything else is a control message.
    pub fn is_stream_message(&self) -> bool {
        let code: u8 = (*self).into();
        code == u8::from(MessageType::SendAtoDData)
            || (u8::from(MessageType::SendAtoDDataMsg2)..=u8::from(MessageType::SendAtoDDataMsg10)).contains(&code)
            || (u8::from(MessageType::ImpedanceCh1)..=u8::from(MessageType::ImpedanceCh20)).contains(&code)
    }
}

/// A Neurofield module on the bus, identified by its type and serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    pub device_type: DeviceType,
    pub serial: u8,
}

impl Device {
    pub fn new(device_type: DeviceType, serial: u8) -> Self {
        Self { device_type, serial }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type: {}, Serial: {}", self.device_type, self.serial)
    }
}

/// Decoded identifier of a frame with a known module and message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub slave_to_host: bool,
    pub module_type: DeviceType,
    pub serial: u8,
    pub message_type: MessageType,
}

impl Header {
    pub fn is_from(&self, device: &Device) -> bool {
        self.slave_to_host && self.module_type == device.device_type && self.serial == device.serial
    }
}

impl TryFrom<u32> for Header {
    type Error = Q21Error;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        let bits = CanId::from_raw(id);
        let module_type =
            DeviceType::try_from(bits.module_type()).map_err(|_| Q21Error::UnknownIdentifier { id })?;
        let message_type =
            MessageType::try_from(bits.message_type()).map_err(|_| Q21Error::UnknownIdentifier { id })?;

        Ok(Header {
            slave_to_host: bits.slave_to_host(),
            module_type,
            serial: bits.serial(),
            message_type,
        })
    }
}

/// Build the identifier for a host-to-device frame. `None` addresses the
/// whole bus and is only used for the discovery query.
pub fn encode(device: Option<&Device>, message_type: u8) -> u32 {
    let bits = match device {
        Some(device) => CanId::new()
            .with_module_type(device.device_type.into())
            .with_serial(device.serial),
        None => CanId::new(),
    };
    bits.with_message_type(message_type).with_slave_to_host(false).raw()
}

/// Decode an identifier, classifying anything outside the enumerated module
/// and message sets as unknown (`None`).
pub fn decode(id: u32) -> Option<Header> {
    Header::try_from(id).ok()
}

/// A single classic CAN frame as exchanged with the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub extended: bool,
    pub data: Bytes,
}

impl CanFrame {
    pub fn extended(id: u32, data: &[u8]) -> Result<Self, Q21Error> {
        Self::build(id & EXTENDED_ID_MASK, true, data)
    }

    pub fn standard(id: u32, data: &[u8]) -> Result<Self, Q21Error> {
        Self::build(id & STANDARD_ID_MASK, false, data)
    }

    fn build(id: u32, extended: bool, data: &[u8]) -> Result<Self, Q21Error> {
        if data.len() > MAX_FRAME_PAYLOAD {
            return Err(Q21Error::InvalidFrame(format!(
                "{} data bytes exceed the {} byte limit",
                data.len(),
                MAX_FRAME_PAYLOAD
            )));
        }
        Ok(Self {
            id,
            extended,
            data: Bytes::copy_from_slice(data),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_query_has_zero_id() {
        assert_eq!(encode(None, MessageType::CANBusQuery.into()), 0);
    }

    #[test]
    fn encode_places_fields() {
        let device = Device::new(DeviceType::EEG21RevK, 0x07);
        assert_eq!(encode(Some(&device), 0x20), 0x00A5_0720);
    }

    #[test]
    fn decode_reads_direction_flag() {
        let header = decode(0x01A5_0703).expect("known identifier");
        assert!(header.slave_to_host);
        assert_eq!(header.module_type, DeviceType::EEG21RevK);
        assert_eq!(header.serial, 7);
        assert_eq!(header.message_type, MessageType::SendAtoDData);
    }

    #[test]
    fn decode_ignores_bits_above_direction_flag() {
        let header = decode(0x1FA4_0300).expect("known identifier");
        assert!(header.slave_to_host);
        assert_eq!(header.module_type, DeviceType::EEG21RevA);
        assert_eq!(header.serial, 3);
    }

    #[test]
    fn unknown_module_or_message_is_rejected() {
        assert_eq!(decode(0x0177_0003), None);
        assert_eq!(decode(0x01A5_0720), None);
        assert!(matches!(
            Header::try_from(0x0001_0000),
            Err(Q21Error::UnknownIdentifier { id: 0x0001_0000 })
        ));
    }

    #[test]
    fn stream_classification() {
        assert!(MessageType::SendAtoDData.is_stream_message());
        assert!(MessageType::SendAtoDDataMsg10.is_stream_message());
        assert!(MessageType::ImpedanceCh1.is_stream_message());
        assert!(MessageType::ImpedanceCh20.is_stream_message());
        assert!(!MessageType::CANBusQuery.is_stream_message());
        assert!(!MessageType::Abort.is_stream_message());
    }

    #[test]
    fn frame_payload_limit() {
        assert!(CanFrame::extended(0, &[0u8; 8]).is_ok());
        assert!(matches!(
            CanFrame::extended(0, &[0u8; 9]),
            Err(Q21Error::InvalidFrame(_))
        ));
    }
}
