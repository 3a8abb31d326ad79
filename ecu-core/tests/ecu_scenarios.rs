// End-to-end scenarios over the in-memory bus: an external node sends
// control frames, a tap connection watches what the ECU puts on the bus.
use ecu_core::{
    Connection, EcuConfig, Frame, FrameReport, Ignition, MemoryBus, ReceiveLoop, Transport,
    IGNITION_ID,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const INTERVAL_MS: u64 = 20;

fn ignition(value: u8) -> Frame {
    Frame::full(IGNITION_ID, [value, 0, 0, 0, 0, 0, 0, 0])
}

fn start_ecu(bus: &MemoryBus) -> ReceiveLoop<MemoryBus> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = EcuConfig::new().with_telemetry_interval_ms(INTERVAL_MS);
    ReceiveLoop::connect(Arc::new(bus.clone()), &config).unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn count_by_id(frames: &[Frame]) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();
    for frame in frames {
        *counts.entry(frame.id).or_insert(0) += 1;
    }
    counts
}

#[test]
fn engine_on_scenario() {
    let bus = MemoryBus::new();
    let mut ecu = start_ecu(&bus);

    let report = ecu.process_frame(ignition(1)).unwrap();
    assert_eq!(report.decoded.to_string(), "Engine ON");
    assert_eq!(ecu.ignition(), Ignition::On);

    ecu.controller_mut().shutdown();
    assert_eq!(ecu.ignition(), Ignition::Off);
}

#[test]
fn telemetry_flows_while_ignition_is_on() {
    let bus = MemoryBus::new();
    let mut tap = bus.connect().unwrap();
    let mut ecu = start_ecu(&bus);

    ecu.process_frame(ignition(1)).unwrap();

    let mut seen = Vec::new();
    assert!(wait_until(|| {
        seen.extend(tap.drain());
        seen.len() >= 12
    }));

    let counts = count_by_id(&seen);
    for id in 0x200..=0x205u32 {
        assert!(counts.get(&id).copied().unwrap_or(0) >= 1, "no frame for 0x{:X}", id);
    }

    let reports = ecu.controller_mut().shutdown();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].cycles >= 2);
    assert_eq!(reports[0].send_failures, 0);
}

#[test]
fn duplicate_ignition_on_never_duplicates_the_stream() {
    let bus = MemoryBus::new();
    let mut tap = bus.connect().unwrap();
    let mut ecu = start_ecu(&bus);

    ecu.process_frame(ignition(1)).unwrap();
    ecu.process_frame(ignition(1)).unwrap();
    assert_eq!(ecu.controller().generators_started(), 1);

    thread::sleep(Duration::from_millis(INTERVAL_MS * 5));
    let reports = ecu.controller_mut().shutdown();
    let frames = tap.drain();

    // One generator: every sensor appears exactly once per cycle
    let cycles = reports.iter().map(|r| r.cycles).sum::<u64>() as usize;
    let counts = count_by_id(&frames);
    for id in 0x200..=0x205u32 {
        assert_eq!(counts.get(&id).copied().unwrap_or(0), cycles);
    }
}

#[test]
fn on_off_on_ends_with_one_live_generator() {
    let bus = MemoryBus::new();
    let mut ecu = start_ecu(&bus);

    ecu.process_frame(ignition(1)).unwrap();
    ecu.process_frame(ignition(0)).unwrap();
    ecu.process_frame(ignition(1)).unwrap();

    assert_eq!(ecu.ignition(), Ignition::On);
    assert!(wait_until(|| ecu.controller().live_generators() == 1));

    ecu.process_frame(ignition(0)).unwrap();
    assert!(wait_until(|| ecu.controller().live_generators() == 0));
    assert_eq!(ecu.stats().ignition_changes, 4);
}

#[test]
fn short_and_unknown_frames_through_the_loop() {
    let bus = MemoryBus::new();
    let mut ecu = start_ecu(&bus);

    bus.inject(Frame::new(0x200, &[0, 87, 0, 0, 0]).unwrap()).unwrap();
    bus.inject(Frame::full(0x999, [1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
    bus.inject(Frame::full(0x202, [95, 0, 0, 0, 0, 0, 0, 0])).unwrap();
    bus.close();

    let mut reports: Vec<FrameReport> = Vec::new();
    let stats = ecu.run(|report| reports.push(report.clone())).unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].frame.id, 0x999);
    assert!(!reports[0].decoded.is_recognized());
    assert!(reports[0].to_string().contains("01 02 03 04 05 06 07 08"));
    assert_eq!(reports[1].decoded.to_string(), "Oxygen Sensor: 95%");
    assert_eq!(ecu.ignition(), Ignition::Off);
}

#[test]
fn receive_loop_logs_its_own_telemetry() {
    let bus = MemoryBus::new();
    let mut external = bus.connect().unwrap();
    let mut ecu = start_ecu(&bus);

    external.send(&ignition(1)).unwrap();

    // Let a couple of telemetry cycles reach the RX connection, then end the stream
    let closer = {
        let bus = bus.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(INTERVAL_MS * 4));
            bus.close();
        })
    };

    let mut telemetry = 0;
    let stats = ecu
        .run(|report| {
            if (0x200..=0x205).contains(&report.frame.id) {
                assert!(report.decoded.is_recognized());
                telemetry += 1;
            }
        })
        .unwrap();
    closer.join().unwrap();

    assert!(telemetry >= 6);
    assert_eq!(stats.ignition_changes, 1);
    ecu.controller_mut().shutdown();
}
