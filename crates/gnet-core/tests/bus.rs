//! Bus session and device handle tests against a scripted transport

use gnet_core::bus::{volume_code_from_db, BusSession};
use gnet_core::device::{BypassConfig, LedColor, FIELD_INPUT_DBFS, FIELD_TEMPERATURE};
use gnet_core::protocol::{
    Command, Frame, ProtocolError, Response, Transport, ADAPTER_ADDRESS, GNET_BROADCAST_ADDR,
    GNET_MULTICAST_ADDR,
};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;

/// Transport that records sent frames and replays queued outcomes.
/// Once the queue runs dry every receive times out.
#[derive(Default)]
struct ScriptedTransport {
    sent: Vec<Frame>,
    replies: VecDeque<Result<Response, ProtocolError>>,
}

impl ScriptedTransport {
    fn with_replies(replies: Vec<Result<Response, ProtocolError>>) -> Self {
        Self {
            sent: Vec::new(),
            replies: replies.into(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        self.sent.push(frame.clone());
        Ok(())
    }

    fn receive(&mut self) -> Result<Response, ProtocolError> {
        self.replies
            .pop_front()
            .unwrap_or(Err(ProtocolError::Timeout))
    }
}

fn ack(payload: &[u8]) -> Result<Response, ProtocolError> {
    Ok(Response::ack(ADAPTER_ADDRESS, payload.to_vec()))
}

/// Race + assign replies for monitors getting consecutive addresses from `first`
fn discovery_replies(serials: &[[u8; 3]], first: u8) -> Vec<Result<Response, ProtocolError>> {
    serials
        .iter()
        .zip(first..)
        .flat_map(|(serial, address)| [ack(serial), ack(&[address])])
        .collect()
}

fn session_with_monitors(serials: &[[u8; 3]]) -> BusSession<ScriptedTransport> {
    let mut session =
        BusSession::new(ScriptedTransport::with_replies(discovery_replies(serials, 2)));
    session.discover_all().unwrap();
    session.transport_mut().sent.clear();
    session
}

fn sent_payloads(session: &BusSession<ScriptedTransport>) -> Vec<Vec<u8>> {
    session
        .transport()
        .sent
        .iter()
        .map(|f| f.payload().to_vec())
        .collect()
}

// =============================================================================
// Broadcasts
// =============================================================================

#[test]
fn test_wakeup_all() {
    let mut session = BusSession::new(ScriptedTransport::default());
    session.wakeup_all().unwrap();

    let sent = &session.transport().sent;
    assert_eq!(sent.len(), 4);
    assert_eq!(
        sent[0].as_bytes(),
        &[0xFF, 0x3A, 0x03, 0x7F, 0x6C, 0x13, 0x7E]
    );
    assert!(sent
        .iter()
        .all(|f| f.address() == GNET_BROADCAST_ADDR && f.command() == Command::Wakeup.code()));
    assert_eq!(
        sent_payloads(&session),
        vec![
            vec![0x03, 0x7F],
            vec![0x03, 0x7F],
            vec![0x03, 0x01],
            vec![0x03, 0x01]
        ]
    );
}

#[test]
fn test_shutdown_all() {
    let mut session = BusSession::new(ScriptedTransport::default());
    session.shutdown_all().unwrap();

    assert_eq!(
        sent_payloads(&session),
        vec![
            vec![0x03, 0x02],
            vec![0x03, 0x02],
            vec![0x03, 0x00],
            vec![0x03, 0x00]
        ]
    );
}

#[test]
fn test_broadcasts_never_read() {
    // A queued reply must still be there afterwards
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![ack(&[])]));
    session.wakeup_all().unwrap();
    session.stay_online().unwrap();
    session.set_volume(-10.0).unwrap();
    assert_eq!(session.transport().replies.len(), 1);

    let last = session.transport().sent.last().unwrap();
    assert_eq!(last.command(), Command::VolumeGlm.code());
}

#[test]
fn test_stay_online() {
    let mut session = BusSession::new(ScriptedTransport::default());
    session.stay_online().unwrap();
    let sent = &session.transport().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].address(), GNET_BROADCAST_ADDR);
    assert_eq!(sent[0].command(), Command::StayOnline.code());
    assert!(sent[0].payload().is_empty());
}

#[test]
fn test_broadcast_refuses_commands_with_replies() {
    let mut session = BusSession::new(ScriptedTransport::default());
    let err = session.broadcast(Command::Poll, &[]).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidParameter(_)));
    assert!(session.transport().sent.is_empty());

    session.broadcast(Command::StayOnline, &[]).unwrap();
    assert_eq!(session.transport().sent.len(), 1);
}

#[test]
fn test_set_volume() {
    let mut session = BusSession::new(ScriptedTransport::default());
    session.set_volume(0.0).unwrap();
    session.set_volume(-4.5).unwrap();
    session.set_volume(-20.0).unwrap();

    let sent = &session.transport().sent;
    assert_eq!(
        sent[0].as_bytes(),
        &[0xFF, 0x1F, 0x7F, 0xFF, 0xFF, 0x83, 0x2F, 0x7E]
    );
    assert_eq!(
        sent_payloads(&session),
        vec![
            vec![0x7F, 0xFF, 0xFF],
            vec![0x4C, 0x3E, 0xA7],
            vec![0x0C, 0xCC, 0xCC]
        ]
    );
}

#[test]
fn test_set_volume_rejects_invalid_levels() {
    let mut session = BusSession::new(ScriptedTransport::default());
    assert!(matches!(
        session.set_volume(1.0),
        Err(ProtocolError::InvalidParameter(_))
    ));
    assert!(matches!(
        session.set_volume(f64::NAN),
        Err(ProtocolError::InvalidParameter(_))
    ));
    assert!(session.transport().sent.is_empty());
}

#[test]
fn test_volume_codes() {
    assert_eq!(volume_code_from_db(0.0).unwrap(), 0x7F_FFFF);
    assert_eq!(volume_code_from_db(-20.0).unwrap(), 0x0C_CCCC);
    assert_eq!(volume_code_from_db(-50.0).unwrap(), 0x67_9F);
    assert!(volume_code_from_db(f64::NEG_INFINITY).is_err());
}

// =============================================================================
// Race and address assignment
// =============================================================================

#[test]
fn test_race() {
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![ack(&[1, 2, 3])]));
    assert_eq!(session.race().unwrap(), 0x010203);
    assert_eq!(
        session.transport().sent[0].as_bytes(),
        &[0xF0, 0xFE, 0xE2, 0xEF, 0x7E]
    );
}

#[test]
fn test_race_timeout_and_malformed_reply() {
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![ack(&[1, 2])]));
    assert!(matches!(
        session.race(),
        Err(ProtocolError::MalformedResponse(_))
    ));
    assert!(session.race().unwrap_err().is_timeout());
}

#[test]
fn test_assign_address() {
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![ack(&[2])]));
    session.assign_address(0x010203, 2).unwrap();
    assert_eq!(
        session.transport().sent[0].as_bytes(),
        &[0xF0, 0xFD, 0x01, 0x02, 0x03, 0x02, 0x1D, 0xAA, 0x7E]
    );
}

#[test]
fn test_assign_address_wrong_echo() {
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![ack(&[3])]));
    match session.assign_address(0x010203, 2) {
        Err(ProtocolError::AssignmentFailed {
            serial,
            address,
            response,
        }) => {
            assert_eq!(serial, 0x010203);
            assert_eq!(address, 2);
            assert_eq!(response, vec![3]);
        }
        other => panic!("expected AssignmentFailed, got {:?}", other),
    }
}

#[test]
fn test_assign_address_rejects_wide_serial() {
    let mut session = BusSession::new(ScriptedTransport::default());
    assert!(matches!(
        session.assign_address(0x0100_0000, 2),
        Err(ProtocolError::InvalidParameter(_))
    ));
    assert!(session.transport().sent.is_empty());
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn test_discovery_assigns_consecutive_addresses() {
    let serials = [[0x01, 0x02, 0x03], [0x0A, 0x0B, 0x0C], [0x04, 0x05, 0x06]];
    let mut session =
        BusSession::new(ScriptedTransport::with_replies(discovery_replies(&serials, 2)));

    let found = session.discover_all().unwrap();
    let got: Vec<(u8, Option<u32>)> = found.iter().map(|d| (d.address, d.serial())).collect();
    assert_eq!(
        got,
        vec![
            (2, Some(0x010203)),
            (3, Some(0x0A0B0C)),
            (4, Some(0x040506))
        ]
    );
    assert_eq!(session.addresses(), vec![2, 3, 4]);
    assert_eq!(session.find_by_serial(0x0A0B0C).unwrap().address(), 3);

    // race, assign per monitor, then the race that timed out
    let sent = &session.transport().sent;
    assert_eq!(sent.len(), 7);
    assert_eq!(sent[1].payload(), &[0x01, 0x02, 0x03, 0x02]);
    assert_eq!(sent[3].payload(), &[0x0A, 0x0B, 0x0C, 0x03]);
    assert_eq!(sent[5].payload(), &[0x04, 0x05, 0x06, 0x04]);
    assert!(sent
        .iter()
        .all(|f| f.address() == GNET_MULTICAST_ADDR));
    assert_eq!(sent[6].command(), Command::Race.code());
}

#[test]
fn test_discovery_on_empty_bus() {
    let mut session = BusSession::new(ScriptedTransport::default());
    assert!(session.discover_all().unwrap().is_empty());
    assert!(session.addresses().is_empty());
}

#[test]
fn test_discovery_continues_after_known_devices() {
    let mut session = session_with_monitors(&[[0, 0, 1], [0, 0, 2]]);
    session.attach_adapter();
    session
        .transport_mut()
        .replies
        .extend(discovery_replies(&[[0, 0, 3]], 4));

    let found: Vec<u8> = session
        .discover(true)
        .map(|d| d.unwrap().address)
        .collect();
    assert_eq!(found, vec![1, 2, 3, 4]);
    assert_eq!(session.find_by_serial(3).unwrap().address(), 4);
}

#[test]
fn test_discovery_without_known_devices() {
    let mut session = session_with_monitors(&[[0, 0, 1]]);
    let found: Vec<_> = session.discover(false).collect();
    assert!(found.is_empty());
    assert_eq!(session.addresses(), vec![2]);
}

#[test]
fn test_discovery_stops_when_dropped() {
    let serials = [[0, 0, 1], [0, 0, 2]];
    let mut session =
        BusSession::new(ScriptedTransport::with_replies(discovery_replies(&serials, 2)));

    let first = session.discover(false).next().unwrap().unwrap();
    assert_eq!(first.address, 2);
    assert_eq!(session.addresses(), vec![2]);
    assert_eq!(session.transport().sent.len(), 2);
}

#[test]
fn test_discovery_error_ends_iteration() {
    let mut replies = discovery_replies(&[[0, 0, 1]], 2);
    replies.push(Err(ProtocolError::Status(0x05)));
    replies.extend(discovery_replies(&[[0, 0, 2]], 3));
    let mut session = BusSession::new(ScriptedTransport::with_replies(replies));

    let mut discovery = session.discover(false);
    assert_eq!(discovery.next().unwrap().unwrap().address, 2);
    assert!(matches!(
        discovery.next(),
        Some(Err(ProtocolError::Status(0x05)))
    ));
    assert!(discovery.next().is_none());
    drop(discovery);

    // The monitor found before the error stays registered
    assert_eq!(session.addresses(), vec![2]);
}

#[test]
fn test_discovery_failed_assignment() {
    let replies = vec![ack(&[0, 0, 9]), ack(&[7])];
    let mut session = BusSession::new(ScriptedTransport::with_replies(replies));
    assert!(matches!(
        session.discover_all(),
        Err(ProtocolError::AssignmentFailed { serial: 9, address: 2, .. })
    ));
    assert!(session.addresses().is_empty());
}

// =============================================================================
// Device handles
// =============================================================================

#[test]
fn test_adapter_queries() {
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![
        ack(b"012345"),
        ack(b"GLM Adapter 2.1 0 12 1\0\0"),
        ack(b"GLM;adapter;2.1.0;2019-05-01;build 41"),
    ]));

    let mut adapter = session.attach_adapter();
    assert_eq!(adapter.address(), ADAPTER_ADDRESS);
    assert_eq!(adapter.query_mic_serial().unwrap(), "012345");
    assert_eq!(adapter.query_hardware().unwrap().model(), "GLM Adapter");
    adapter.query_software().unwrap();

    let device = adapter.device();
    assert_eq!(device.mic_serial.as_deref(), Some("012345"));
    assert_eq!(device.software_version(), Some(("2.1.0", "build 41")));
    assert_eq!(device.to_string(), "[1]GLM Adapter");

    assert_eq!(
        session.transport().sent[0].as_bytes(),
        &[0x01, 0x51, 0x82, 0x44, 0x95, 0x0F, 0x7E]
    );
}

#[test]
fn test_attach_adapter_is_idempotent() {
    let mut session = BusSession::new(ScriptedTransport::with_replies(vec![ack(b"GLMA1")]));
    session.attach_adapter().query_barcode().unwrap();
    session.attach_adapter();
    assert_eq!(session.addresses(), vec![ADAPTER_ADDRESS]);
    assert_eq!(
        session.device(ADAPTER_ADDRESS).unwrap().barcode.as_deref(),
        Some("GLMA1")
    );
    assert_eq!(session.transport().sent[0].payload(), &[0x01]);
}

#[test]
fn test_mic_serial_is_adapter_only() {
    let mut session = session_with_monitors(&[[0, 0, 1]]);
    let mut monitor = session.device_mut(2).unwrap();
    assert!(matches!(
        monitor.query_mic_serial(),
        Err(ProtocolError::Unsupported(_))
    ));
    assert!(session.transport().sent.is_empty());
}

#[test]
fn test_monitor_poll_merges_telemetry() {
    let mut session = session_with_monitors(&[[0, 0, 1]]);
    session.transport_mut().replies.extend([
        ack(b"A\x16\x83\x00\x1eB\x96F\x93C\x80E\x82G\x01\x84\x01e"),
        ack(&[]),
    ]);

    let mut monitor = session.device_mut(2).unwrap();
    let fields = monitor.poll().unwrap();
    assert_eq!(fields[FIELD_TEMPERATURE], 22.0);
    assert_eq!(fields[FIELD_INPUT_DBFS], -106.0);

    // An empty reply adds nothing and keeps what was there
    assert!(monitor.poll().unwrap().is_empty());
    assert_eq!(monitor.device().telemetry.len(), 3);

    let sent = &session.transport().sent;
    assert_eq!(sent[0].as_bytes(), &[0x02, 0x08, 0x18, 0x95, 0x7E]);
}

#[test]
fn test_poll_timeout_is_reported() {
    let mut session = session_with_monitors(&[[0, 0, 1]]);
    let err = session.device_mut(2).unwrap().poll().unwrap_err();
    assert!(err.is_timeout());
    assert!(session.device(2).unwrap().telemetry.is_empty());
}

#[test]
fn test_bypass_and_gain() {
    let mut session = session_with_monitors(&[[0, 0, 1]]);
    session
        .transport_mut()
        .replies
        .extend([ack(&[]), ack(&[]), ack(&[])]);

    let mut monitor = session.device_mut(2).unwrap();
    monitor.mute(true).unwrap();
    monitor
        .set_bypass(&BypassConfig {
            led_color: Some(LedColor::Red),
            led_pulsing: Some(true),
            ..BypassConfig::default()
        })
        .unwrap();
    monitor.set_digisum_gain(-300).unwrap();

    let sent = &session.transport().sent;
    assert!(sent.iter().all(|f| f.address() == 2));
    assert_eq!(sent[0].command(), Command::Bypass.code());
    assert_eq!(
        sent_payloads(&session),
        vec![vec![0x01], vec![0b0000_1100], vec![0xFE, 0xD4]]
    );
}

#[test]
fn test_device_error_status() {
    let mut session = session_with_monitors(&[[0, 0, 1]]);
    session
        .transport_mut()
        .replies
        .push_back(Err(ProtocolError::Status(0x05)));
    assert!(matches!(
        session.device_mut(2).unwrap().query_software(),
        Err(ProtocolError::Status(0x05))
    ));
    assert!(session.device(2).unwrap().software.is_none());
}

#[test]
fn test_unknown_address_has_no_handle() {
    let mut session = BusSession::new(ScriptedTransport::default());
    assert!(session.device_mut(2).is_none());
    assert!(session.device(ADAPTER_ADDRESS).is_none());
}
