//! In-memory transport with scripted adapter responses.
//!
//! Reads are served from a queue (an empty queue reports
//! `ReceiveQueueEmpty`, a reset drops whatever is pending), writes are
//! recorded and answered from a queue of results (an empty queue means
//! success). Used by the test-suite and handy
//! for exercising application code without hardware.

use crate::codec::{self, CanFrame, Device, MessageType};
use crate::constants::{MAX_FRAME_PAYLOAD, SLAVE_TO_HOST_BIT};
use crate::transport::{CanTransport, ChannelCondition, ReceivedFrame, TraceConfig, TransportStatus};
use bytes::Bytes;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct MockTransport {
    name: String,
    condition: Result<ChannelCondition, TransportStatus>,
    initialized: bool,
    reads: VecDeque<Result<ReceivedFrame, TransportStatus>>,
    write_results: VecDeque<Result<(), TransportStatus>>,
    init_results: VecDeque<Result<(), TransportStatus>>,
    uninit_results: VecDeque<Result<(), TransportStatus>>,
    trace_results: VecDeque<Result<(), TransportStatus>>,
    written: Vec<CanFrame>,
    write_attempts: usize,
    read_polls: usize,
    initializations: usize,
    uninitializations: usize,
    resets: usize,
    last_bitrate: Option<u32>,
    last_trace: Option<TraceConfig>,
}

impl MockTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: Ok(ChannelCondition::Available),
            initialized: false,
            reads: VecDeque::new(),
            write_results: VecDeque::new(),
            init_results: VecDeque::new(),
            uninit_results: VecDeque::new(),
            trace_results: VecDeque::new(),
            written: Vec::new(),
            write_attempts: 0,
            read_polls: 0,
            initializations: 0,
            uninitializations: 0,
            resets: 0,
            last_bitrate: None,
            last_trace: None,
        }
    }

    pub fn with_condition(mut self, condition: Result<ChannelCondition, TransportStatus>) -> Self {
        self.condition = condition;
        self
    }

    /// Queue a frame for a later read.
    pub fn push_frame(&mut self, frame: CanFrame, timestamp_us: u64) -> &mut Self {
        self.reads.push_back(Ok(ReceivedFrame { frame, timestamp_us }));
        self
    }

    /// Queue a frame sent by `device` (direction flag set).
    pub fn push_device_frame(
        &mut self,
        device: &Device,
        message_type: MessageType,
        data: &[u8],
        timestamp_us: u64,
    ) -> &mut Self {
        self.push_frame(device_frame(device, message_type, data), timestamp_us)
    }

    /// Queue a non-success read status, e.g. an empty poll or a bus fault.
    pub fn push_read_status(&mut self, status: TransportStatus) -> &mut Self {
        self.reads.push_back(Err(status));
        self
    }

    pub fn push_write_result(&mut self, result: Result<(), TransportStatus>) -> &mut Self {
        self.write_results.push_back(result);
        self
    }

    pub fn push_initialize_result(&mut self, result: Result<(), TransportStatus>) -> &mut Self {
        self.init_results.push_back(result);
        self
    }

    pub fn push_uninitialize_result(&mut self, result: Result<(), TransportStatus>) -> &mut Self {
        self.uninit_results.push_back(result);
        self
    }

    pub fn push_trace_result(&mut self, result: Result<(), TransportStatus>) -> &mut Self {
        self.trace_results.push_back(result);
        self
    }

    /// Frames accepted by the adapter, in order.
    pub fn written(&self) -> &[CanFrame] {
        &self.written
    }

    /// Every write call, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts
    }

    pub fn read_polls(&self) -> usize {
        self.read_polls
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn initializations(&self) -> usize {
        self.initializations
    }

    pub fn uninitializations(&self) -> usize {
        self.uninitializations
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_bitrate(&self) -> Option<u32> {
        self.last_bitrate
    }

    pub fn last_trace(&self) -> Option<TraceConfig> {
        self.last_trace
    }
}

impl CanTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn condition(&mut self) -> Result<ChannelCondition, TransportStatus> {
        self.condition
    }

    fn initialize(&mut self, bitrate: u32) -> Result<(), TransportStatus> {
        self.initializations += 1;
        self.last_bitrate = Some(bitrate);
        let result = self.init_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.initialized = true;
        }
        result
    }

    fn uninitialize(&mut self) -> Result<(), TransportStatus> {
        self.uninitializations += 1;
        let result = self.uninit_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.initialized = false;
        }
        result
    }

    fn configure_trace(&mut self, trace: &TraceConfig) -> Result<(), TransportStatus> {
        self.last_trace = Some(*trace);
        self.trace_results.pop_front().unwrap_or(Ok(()))
    }

    fn write(&mut self, frame: &CanFrame) -> Result<(), TransportStatus> {
        self.write_attempts += 1;
        if !self.initialized {
            return Err(TransportStatus::InvalidOperation);
        }
        let result = self.write_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.written.push(frame.clone());
        }
        result
    }

    fn read(&mut self) -> Result<ReceivedFrame, TransportStatus> {
        self.read_polls += 1;
        if !self.initialized {
            return Err(TransportStatus::InvalidOperation);
        }
        self.reads.pop_front().unwrap_or(Err(TransportStatus::ReceiveQueueEmpty))
    }

    fn reset(&mut self) -> Result<(), TransportStatus> {
        self.resets += 1;
        self.reads.clear();
        Ok(())
    }
}

/// Build the extended frame `device` would send for `message_type`.
/// `data` is cut to the classic 8 byte payload.
pub fn device_frame(device: &Device, message_type: MessageType, data: &[u8]) -> CanFrame {
    CanFrame {
        id: codec::encode(Some(device), message_type.into()) | SLAVE_TO_HOST_BIT,
        extended: true,
        data: Bytes::copy_from_slice(&data[..data.len().min(MAX_FRAME_PAYLOAD)]),
    }
}
