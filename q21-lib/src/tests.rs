use crate::codec::{self, CanFrame, Device, DeviceType, MessageType};
use crate::config::{LinkConfig, PROTOCOL_BITRATE};
use crate::error::Q21Error;
use crate::link::{LinkManager, online_channels};
use crate::mock::MockTransport;
use crate::transport::{ChannelCondition, TraceConfig, TransportStatus};

fn bound_link(transport: MockTransport) -> LinkManager<MockTransport> {
    LinkManager::bind(transport, LinkConfig::without_delays()).expect("bind succeeds")
}

#[test]
fn test_bind_initializes_channel() {
    let link = bound_link(MockTransport::new("mock0"));
    let transport = link.transport();
    assert!(transport.is_initialized());
    assert_eq!(transport.last_bitrate(), Some(PROTOCOL_BITRATE));
    assert_eq!(
        transport.last_trace(),
        Some(TraceConfig {
            max_size_mb: 5,
            single_file: true,
            overwrite_existing: true,
        })
    );
}

#[test]
fn test_bind_rejects_unavailable_channel() {
    for condition in [
        Ok(ChannelCondition::Occupied),
        Ok(ChannelCondition::Unavailable),
        Err(TransportStatus::Hardware(7)),
    ] {
        let transport = MockTransport::new("mock0").with_condition(condition);
        let result = LinkManager::bind(transport, LinkConfig::without_delays());
        assert!(matches!(
            result,
            Err(Q21Error::ChannelUnavailable { ref channel }) if channel == "mock0"
        ));
    }
}

#[test]
fn test_bind_releases_on_trace_failure() {
    let mut transport = MockTransport::new("mock0");
    transport.push_trace_result(Err(TransportStatus::Hardware(1)));
    let result = LinkManager::bind(transport, LinkConfig::without_delays());
    assert!(matches!(
        result,
        Err(Q21Error::Transport {
            operation: "configure trace",
            ..
        })
    ));
}

#[test]
fn test_send_encodes_identifier_and_payload() {
    let mut link = bound_link(MockTransport::new("mock0"));
    let device = Device::new(DeviceType::EEG21RevK, 0x42);
    link.send(Some(&device), 0x03, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    let written = link.transport().written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].id, 0x00A5_4203);
    assert!(written[0].extended);
    assert_eq!(written[0].data.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_send_fails_fast_on_other_errors() {
    let mut transport = MockTransport::new("mock0");
    transport.push_write_result(Err(TransportStatus::BusHeavy));
    let mut link = bound_link(transport);

    let err = link.send(None, 0, &[0; 8]).unwrap_err();
    assert_eq!(
        err,
        Q21Error::Transport {
            operation: "write",
            status: TransportStatus::BusHeavy,
        }
    );
    assert_eq!(link.transport().write_attempts(), 1);
    assert_eq!(link.transport().initializations(), 1);
}

#[test]
fn test_bus_off_recovers_after_five_failures() {
    let mut transport = MockTransport::new("mock0");
    for _ in 0..5 {
        transport.push_write_result(Err(TransportStatus::BusOff));
    }
    let mut link = bound_link(transport);

    link.send(None, MessageType::CANBusQuery.into(), &[0; 8]).unwrap();

    let transport = link.transport();
    assert_eq!(transport.write_attempts(), 6);
    assert_eq!(transport.written().len(), 1);
    // one bind + four failed retries + the successful one
    assert_eq!(transport.initializations(), 1 + 5);
    assert_eq!(transport.uninitializations(), 5);
}

#[test]
fn test_bus_off_gives_up_after_thirty_attempts() {
    let mut transport = MockTransport::new("mock0");
    for _ in 0..31 {
        transport.push_write_result(Err(TransportStatus::BusOff));
    }
    let mut link = bound_link(transport);

    let err = link.send(None, 0, &[0; 8]).unwrap_err();
    assert_eq!(err, Q21Error::BusOff { attempts: 30 });
    assert_eq!(link.transport().write_attempts(), 31);
}

#[test]
fn test_bus_off_recovery_counts_failed_reinitialization() {
    let mut transport = MockTransport::new("mock0");
    transport.push_write_result(Err(TransportStatus::BusOff));
    transport.push_initialize_result(Ok(())); // bind
    transport.push_uninitialize_result(Err(TransportStatus::Hardware(2)));
    transport.push_initialize_result(Err(TransportStatus::Hardware(3)));
    let mut link = bound_link(transport);

    link.send(None, 0, &[0; 8]).unwrap();

    // attempt 1 fails at uninitialize, attempt 2 at initialize, attempt 3 succeeds
    let transport = link.transport();
    assert_eq!(transport.write_attempts(), 2);
    assert_eq!(transport.uninitializations(), 3);
    assert_eq!(transport.initializations(), 3);
}

#[test]
fn test_bus_off_trace_failure_is_fatal() {
    let mut transport = MockTransport::new("mock0");
    transport.push_write_result(Err(TransportStatus::BusOff));
    transport.push_trace_result(Ok(())); // bind
    transport.push_trace_result(Err(TransportStatus::Hardware(9)));
    let mut link = bound_link(transport);

    let err = link.send(None, 0, &[0; 8]).unwrap_err();
    assert!(matches!(err, Q21Error::Transport { operation: "configure trace", .. }));
    assert_eq!(link.transport().write_attempts(), 1);
}

#[test]
fn test_receive_raw_times_out_after_tick_budget() {
    let mut link = bound_link(MockTransport::new("mock0"));
    let err = link.receive_raw().unwrap_err();
    assert_eq!(err, Q21Error::ReceiveTimeout { ticks: 1400 });
    assert!(err.is_timeout());
    assert_eq!(link.transport().read_polls(), 1400);
}

#[test]
fn test_receive_raw_skips_empty_polls() {
    let mut transport = MockTransport::new("mock0");
    transport.push_read_status(TransportStatus::ReceiveQueueEmpty);
    transport.push_read_status(TransportStatus::ReceiveQueueEmpty);
    transport.push_frame(CanFrame::extended(0x0100_0000, &[]).unwrap(), 1234);
    let mut link = bound_link(transport);

    let received = link.receive_raw().unwrap();
    assert_eq!(received.timestamp_us, 1234);
    assert_eq!(link.transport().read_polls(), 3);
}

#[test]
fn test_receive_raw_bus_faults_are_fatal() {
    for status in [TransportStatus::BusLight, TransportStatus::BusHeavy] {
        let mut transport = MockTransport::new("mock0");
        transport.push_read_status(status);
        let mut link = bound_link(transport);
        let err = link.receive_raw().unwrap_err();
        assert_eq!(err, Q21Error::BusFault { status });
        assert!(!err.is_timeout());
        assert_eq!(link.transport().read_polls(), 1);
    }

    let mut transport = MockTransport::new("mock0");
    transport.push_read_status(TransportStatus::InvalidOperation);
    let mut link = bound_link(transport);
    assert!(matches!(
        link.receive_raw(),
        Err(Q21Error::Transport {
            operation: "read",
            status: TransportStatus::InvalidOperation,
        })
    ));
}

#[test]
fn test_receive_from_device_filters_foreign_traffic() {
    let me = Device::new(DeviceType::EEG21RevK, 7);
    let other = Device::new(DeviceType::EEG21RevK, 8);
    let mut transport = MockTransport::new("mock0");

    // standard frame, unknown module, host-to-device, other device, then ours
    transport.push_frame(CanFrame::standard(0x0703, &[0; 6]).unwrap(), 1);
    transport.push_frame(CanFrame::extended(0x0133_0703, &[0; 6]).unwrap(), 2);
    transport.push_frame(
        CanFrame::extended(codec::encode(Some(&me), MessageType::SendAtoDData.into()), &[0; 6]).unwrap(),
        3,
    );
    transport.push_device_frame(&other, MessageType::SendAtoDData, &[0; 6], 4);
    transport.push_device_frame(&me, MessageType::SendAtoDDataMsg2, &[1; 6], 5);
    let mut link = bound_link(transport);

    let rx = link.receive_from_device(&me).unwrap();
    assert_eq!(rx.header.message_type, MessageType::SendAtoDDataMsg2);
    assert_eq!(rx.timestamp_us, 5);
    assert_eq!(rx.frame.data.as_ref(), &[1; 6]);
}

#[test]
fn test_receive_from_device_propagates_timeout() {
    let me = Device::new(DeviceType::EEG21, 1);
    let mut transport = MockTransport::new("mock0");
    transport.push_device_frame(&Device::new(DeviceType::EEG21, 2), MessageType::SendAtoDData, &[0; 6], 1);
    let mut link = bound_link(transport);

    assert_eq!(
        link.receive_from_device(&me).unwrap_err(),
        Q21Error::ReceiveTimeout { ticks: 1400 }
    );
}

#[test]
fn test_release_is_idempotent() {
    let mut link = bound_link(MockTransport::new("mock0"));
    link.release();
    link.release();

    assert!(!link.is_bound());
    assert_eq!(link.transport().resets(), 1);
    assert_eq!(link.transport().uninitializations(), 1);
    assert!(!link.transport().is_initialized());
    assert_eq!(link.send(None, 0, &[0; 8]), Err(Q21Error::LinkReleased));
    assert_eq!(link.receive_raw().unwrap_err(), Q21Error::LinkReleased);
}

#[test]
fn test_online_channels_filters_by_condition() {
    let candidates = vec![
        MockTransport::new("can0"),
        MockTransport::new("can1").with_condition(Ok(ChannelCondition::Occupied)),
        MockTransport::new("can2").with_condition(Err(TransportStatus::Hardware(1))),
        MockTransport::new("can3"),
    ];
    let online: Vec<String> = online_channels(candidates)
        .iter()
        .map(|t| crate::transport::CanTransport::name(t).to_string())
        .collect();
    assert_eq!(online, vec!["can0", "can3"]);
}
