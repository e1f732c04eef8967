//! Multi-frame sample reassembly.
//!
//! A sample is spread over a fixed sequence of frames. The sequencer tracks
//! the stage (index of the next expected frame) and only advances on an exact
//! message type match; anything else throws away the partial sample and
//! starts over at stage 0, without reprocessing the offending frame.

use crate::codec::MessageType;
use crate::constants::*;
use crate::error::Q21Error;
use crate::sample::{AdFrameRaw, ImpedanceFrameRaw, ImpedancePair};
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::warn;
use zerocopy::FromBytes;

/// Frame sequence and per-frame decoding of one sample stream.
pub trait StreamLayout {
    /// What one frame contributes to the sample.
    type Slot: Copy + Default + Debug;

    /// Expected message types, in stage order.
    const SEQUENCE: &'static [MessageType];

    /// Required payload length of every frame in the stream.
    const FRAME_SIZE: usize;

    fn extract(message_type: MessageType, data: &[u8]) -> Result<Self::Slot, Q21Error>;
}

fn framing_error(message_type: MessageType, expected: usize, actual: usize) -> Q21Error {
    Q21Error::FramingError {
        message_type,
        expected,
        actual,
    }
}

/// EEG converter stream: 10 frames, two channels each.
#[derive(Debug, Clone, Copy)]
pub struct AdStream;

impl StreamLayout for AdStream {
    type Slot = [i32; 2];

    const SEQUENCE: &'static [MessageType] = &[
        MessageType::SendAtoDData,
        MessageType::SendAtoDDataMsg2,
        MessageType::SendAtoDDataMsg3,
        MessageType::SendAtoDDataMsg4,
        MessageType::SendAtoDDataMsg5,
        MessageType::SendAtoDDataMsg6,
        MessageType::SendAtoDDataMsg7,
        MessageType::SendAtoDDataMsg8,
        MessageType::SendAtoDDataMsg9,
        MessageType::SendAtoDDataMsg10,
    ];

    const FRAME_SIZE: usize = AD_FRAME_SIZE;

    fn extract(message_type: MessageType, data: &[u8]) -> Result<Self::Slot, Q21Error> {
        let raw = AdFrameRaw::ref_from_bytes(data)
            .map_err(|_| framing_error(message_type, Self::FRAME_SIZE, data.len()))?;
        Ok(raw.values())
    }
}

/// Impedance stream: one frame per channel.
#[derive(Debug, Clone, Copy)]
pub struct ImpedanceStream;

impl StreamLayout for ImpedanceStream {
    type Slot = ImpedancePair;

    const SEQUENCE: &'static [MessageType] = &[
        MessageType::ImpedanceCh1,
        MessageType::ImpedanceCh2,
        MessageType::ImpedanceCh3,
        MessageType::ImpedanceCh4,
        MessageType::ImpedanceCh5,
        MessageType::ImpedanceCh6,
        MessageType::ImpedanceCh7,
        MessageType::ImpedanceCh8,
        MessageType::ImpedanceCh9,
        MessageType::ImpedanceCh10,
        MessageType::ImpedanceCh11,
        MessageType::ImpedanceCh12,
        MessageType::ImpedanceCh13,
        MessageType::ImpedanceCh14,
        MessageType::ImpedanceCh15,
        MessageType::ImpedanceCh16,
        MessageType::ImpedanceCh17,
        MessageType::ImpedanceCh18,
        MessageType::ImpedanceCh19,
        MessageType::ImpedanceCh20,
    ];

    const FRAME_SIZE: usize = IMPEDANCE_FRAME_SIZE;

    fn extract(message_type: MessageType, data: &[u8]) -> Result<Self::Slot, Q21Error> {
        let raw = ImpedanceFrameRaw::ref_from_bytes(data)
            .map_err(|_| framing_error(message_type, Self::FRAME_SIZE, data.len()))?;
        Ok(ImpedancePair::from(*raw))
    }
}

/// A fully reassembled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Reassembled<S> {
    pub slots: Vec<S>,
    /// Arrival time of the stage 0 frame.
    pub timestamp_us: u64,
}

#[derive(Debug, Clone)]
pub struct SampleSequencer<L: StreamLayout> {
    stage: usize,
    slots: Vec<L::Slot>,
    timestamp_us: u64,
    _layout: PhantomData<L>,
}

impl<L: StreamLayout> Default for SampleSequencer<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: StreamLayout> SampleSequencer<L> {
    pub fn new() -> Self {
        Self {
            stage: 0,
            slots: vec![L::Slot::default(); L::SEQUENCE.len()],
            timestamp_us: 0,
            _layout: PhantomData,
        }
    }

    /// Index of the next expected frame.
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Message type the sequencer is waiting for.
    pub fn expected(&self) -> MessageType {
        L::SEQUENCE[self.stage]
    }

    /// Slots of the sample in progress; unfilled stages hold the default.
    pub fn slots(&self) -> &[L::Slot] {
        &self.slots
    }

    /// Drop the partial sample and wait for stage 0 again.
    pub fn reset(&mut self) {
        self.stage = 0;
        self.timestamp_us = 0;
        self.slots.fill(L::Slot::default());
    }

    /// Offer the next frame of the bound device.
    ///
    /// Returns the sample once the last stage is filled. A payload of the
    /// wrong size for the expected type is a fatal framing error.
    pub fn feed(
        &mut self,
        message_type: MessageType,
        data: &[u8],
        timestamp_us: u64,
    ) -> Result<Option<Reassembled<L::Slot>>, Q21Error> {
        let expected = self.expected();
        if message_type != expected {
            warn!(
                stage = self.stage,
                %expected,
                received = %message_type,
                "Data sequence error, resynchronizing"
            );
            self.reset();
            return Ok(None);
        }

        let slot = match L::extract(message_type, data) {
            Ok(slot) => slot,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        self.slots[self.stage] = slot;
        if self.stage == 0 {
            self.timestamp_us = timestamp_us;
        }
        self.stage += 1;

        if self.stage < L::SEQUENCE.len() {
            return Ok(None);
        }

        let done = Reassembled {
            slots: std::mem::replace(&mut self.slots, vec![L::Slot::default(); L::SEQUENCE.len()]),
            timestamp_us: self.timestamp_us,
        };
        self.stage = 0;
        self.timestamp_us = 0;
        Ok(Some(done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_lengths() {
        assert_eq!(AdStream::SEQUENCE.len(), AD_SEQUENCE_LEN);
        assert_eq!(ImpedanceStream::SEQUENCE.len(), IMPEDANCE_SEQUENCE_LEN);
        assert!(AdStream::SEQUENCE.iter().all(MessageType::is_stream_message));
    }

    #[test]
    fn ad_sequence_completes_after_ten_frames() {
        let mut sequencer = SampleSequencer::<AdStream>::new();
        for (stage, &message_type) in AdStream::SEQUENCE.iter().enumerate() {
            let out = sequencer
                .feed(message_type, &[0, 0, stage as u8, 0, 0, 1], 1000 + stage as u64)
                .unwrap();
            if stage < 9 {
                assert!(out.is_none());
                assert_eq!(sequencer.stage(), stage + 1);
            } else {
                let sample = out.expect("sample after the last stage");
                assert_eq!(sample.timestamp_us, 1000);
                assert_eq!(sample.slots[4], [4, 1]);
            }
        }
        assert_eq!(sequencer.stage(), 0);
    }

    #[test]
    fn mismatch_clears_buffered_slots() {
        let mut sequencer = SampleSequencer::<ImpedanceStream>::new();
        for &message_type in &ImpedanceStream::SEQUENCE[..5] {
            sequencer.feed(message_type, &[0, 0, 0, 1, 0, 0, 0, 2], 0).unwrap();
        }
        assert_eq!(sequencer.stage(), 5);

        let out = sequencer.feed(MessageType::ImpedanceCh9, &[0; 8], 0).unwrap();
        assert!(out.is_none());
        assert_eq!(sequencer.stage(), 0);
        assert!(sequencer.slots().iter().all(|pair| *pair == ImpedancePair::default()));
    }

    #[test]
    fn mismatching_stage_zero_frame_is_not_reprocessed() {
        let mut sequencer = SampleSequencer::<AdStream>::new();
        sequencer.feed(MessageType::SendAtoDData, &[0; 6], 0).unwrap();
        // a fresh primary frame arriving at stage 1 only resets
        sequencer.feed(MessageType::SendAtoDData, &[0; 6], 0).unwrap();
        assert_eq!(sequencer.stage(), 0);
    }

    #[test]
    fn wrong_payload_size_is_fatal() {
        let mut sequencer = SampleSequencer::<AdStream>::new();
        let err = sequencer.feed(MessageType::SendAtoDData, &[0; 8], 0).unwrap_err();
        assert_eq!(
            err,
            Q21Error::FramingError {
                message_type: MessageType::SendAtoDData,
                expected: 6,
                actual: 8,
            }
        );
        assert_eq!(sequencer.stage(), 0);
    }
}
