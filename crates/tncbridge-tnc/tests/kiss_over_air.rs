//! Two virtual TNCs talking through the simulated firmware.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tncbridge_block::BlockConfig;
use tncbridge_firmware::sim::{Bench, SoftPort};
use tncbridge_kiss::data_frame;
use tncbridge_radio::{compile, RadioIntent};
use tncbridge_tnc::{RadioLink, Tnc, TncConfig};
use tncbridge_transport::{pair, ManualClock, MemoryLink};

type SimTnc = Tnc<MemoryLink, SoftPort, ManualClock>;

fn station(
    bench: &Arc<Mutex<Bench>>,
    index: usize,
    clock: &ManualClock,
    config: TncConfig,
) -> (SimTnc, MemoryLink) {
    let radio = RadioLink::open(
        Bench::port(bench, index),
        clock.clone(),
        compile(&RadioIntent::default()),
        BlockConfig::default(),
    )
    .expect("link should open");
    let (terminal, app) = pair();
    let mut tnc = Tnc::new(terminal, radio, config);
    tnc.start().expect("TNC should start");
    (tnc, app)
}

fn immediate() -> TncConfig {
    TncConfig {
        serial_window: Duration::ZERO,
        ..TncConfig::default()
    }
}

/// Step both TNCs until `app` has seen `want` bytes.
fn exchange(
    a: &mut SimTnc,
    b: &mut SimTnc,
    clock: &ManualClock,
    app: &MemoryLink,
    want: usize,
) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..50 {
        a.step().unwrap();
        b.step().unwrap();
        out.extend(app.drain());
        if out.len() >= want {
            break;
        }
        clock.advance(Duration::from_millis(1));
    }
    out
}

#[test]
fn frame_reaches_the_other_terminal() {
    let bench = Bench::shared(2);
    let clock = ManualClock::new();
    let (mut a, mut app_a) = station(&bench, 0, &clock, immediate());
    let (mut b, app_b) = station(&bench, 1, &clock, immediate());

    let frame = data_frame(0, b"CQ CQ de F4EXB");
    app_a.write_all(&frame).unwrap();

    let received = exchange(&mut a, &mut b, &clock, &app_b, frame.len());
    assert_eq!(received, frame);
    assert_eq!(a.stats().packets_to_radio, 1);
    assert_eq!(b.stats().packets_from_radio, 1);
    assert!(b.radio().is_rx_armed());
}

#[test]
fn conversation_in_both_directions() {
    let bench = Bench::shared(2);
    let clock = ManualClock::new();
    let (mut a, mut app_a) = station(&bench, 0, &clock, immediate());
    let (mut b, mut app_b) = station(&bench, 1, &clock, immediate());

    let question = data_frame(0, b"ping");
    app_a.write_all(&question).unwrap();
    assert_eq!(
        exchange(&mut a, &mut b, &clock, &app_b, question.len()),
        question
    );

    let answer = data_frame(0, b"pong");
    app_b.write_all(&answer).unwrap();
    assert_eq!(
        exchange(&mut b, &mut a, &clock, &app_a, answer.len()),
        answer
    );
}

#[test]
fn serial_window_delays_transmission() {
    let bench = Bench::shared(2);
    let clock = ManualClock::new();
    let (mut a, mut app_a) = station(&bench, 0, &clock, TncConfig::default());
    let (mut b, app_b) = station(&bench, 1, &clock, immediate());

    let frame = data_frame(0, b"later");
    app_a.write_all(&frame).unwrap();
    a.step().unwrap();
    b.step().unwrap();
    assert!(app_b.drain().is_empty());
    assert_eq!(a.stats().packets_to_radio, 0);

    clock.advance(Duration::from_millis(50));
    let received = exchange(&mut a, &mut b, &clock, &app_b, frame.len());
    assert_eq!(received, frame);
}

#[test]
fn configuration_stays_local() {
    let bench = Bench::shared(2);
    let clock = ManualClock::new();
    let (mut a, mut app_a) = station(&bench, 0, &clock, immediate());
    let (mut b, app_b) = station(&bench, 1, &clock, immediate());

    let frame = data_frame(0, b"data");
    let mut stream = vec![0xC0, 0x01, 2, 0xC0];
    stream.extend_from_slice(&frame);
    app_a.write_all(&stream).unwrap();

    let received = exchange(&mut a, &mut b, &clock, &app_b, frame.len());
    assert_eq!(received, frame);
    assert_eq!(a.kiss_params().keyup_delay, Duration::from_millis(20));
    assert_eq!(a.stats().config_frames, 1);
}

#[test]
fn lost_packet_leaves_both_sides_listening() {
    let bench = Bench::shared(2);
    let clock = ManualClock::new();
    let (mut a, mut app_a) = station(&bench, 0, &clock, immediate());
    let (mut b, app_b) = station(&bench, 1, &clock, immediate());
    bench.lock().unwrap().ether_mut().lose = 1;

    app_a.write_all(&data_frame(0, b"gone")).unwrap();
    let received = exchange(&mut a, &mut b, &clock, &app_b, 1);
    assert!(received.is_empty());
    assert!(a.radio().is_rx_armed());
    assert!(b.radio().is_rx_armed());

    let frame = data_frame(0, b"again");
    app_a.write_all(&frame).unwrap();
    assert_eq!(
        exchange(&mut a, &mut b, &clock, &app_b, frame.len()),
        frame
    );
}
