//! File transfer over the radio and the link test routines.
//!
//! All of these expect an initialised [`RadioLink`] and leave reception
//! cancelled when they return.

use std::io::{Read, Write};
use std::time::Duration;

use serde::Serialize;
use tncbridge_block::{block_count, BlockError};
use tncbridge_radio::rssi_dbm;
use tncbridge_transport::{Clock, Duplex};
use tracing::{debug, info, warn};

use crate::error::{Result, TncError};
use crate::radio::RadioLink;

/// Chunk size for bulk transmission and the TX test.
pub const DEFAULT_LARGE_PACKET: usize = 480;

/// How long bulk reception waits for the first packet.
pub const BULK_FIRST_TIMEOUT: Duration = Duration::from_secs(4);

/// How long bulk reception waits for each later packet. Silence this long
/// ends the transfer.
pub const BULK_INTER_PACKET_TIMEOUT: Duration = Duration::from_millis(500);

/// Outcome of a bulk transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub packets: u64,
    pub bytes: u64,
    /// Packets lost to CRC, sequence or reception errors.
    pub dropped: u64,
}

/// Outcome of a TX test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub packets_sent: u64,
    pub failures: u64,
    pub packet_size: usize,
    pub blocks_per_packet: usize,
}

/// One packet seen by the RX test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RxSample {
    pub index: u32,
    pub size: usize,
    pub blocks: usize,
    pub rssi_dbm: f32,
    pub lqi: u8,
    pub crc_ok: bool,
    /// Payload as text, trailing padding removed.
    pub text: String,
    /// Why nothing usable was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RxSample {
    fn failed(index: u32, err: &TncError) -> Self {
        Self {
            index,
            size: 0,
            blocks: 0,
            rssi_dbm: 0.0,
            lqi: 0,
            crc_ok: false,
            text: String::new(),
            error: Some(err.to_string()),
        }
    }
}

/// Send everything `input` yields, `chunk` bytes per packet.
///
/// Stops at the first packet the radio fails to send.
pub fn bulk_transmit<S, C, R>(
    radio: &mut RadioLink<S, C>,
    mut input: R,
    chunk: usize,
) -> Result<BulkReport>
where
    S: Duplex,
    C: Clock + Clone,
    R: Read,
{
    let mut report = BulkReport::default();
    let mut buf = Vec::with_capacity(chunk);
    loop {
        buf.clear();
        let n = input.by_ref().take(chunk as u64).read_to_end(&mut buf)?;
        if n == 0 {
            break;
        }
        debug!(packet = report.packets, size = n, "bulk packet");
        radio.send_packet(&buf)?;
        report.packets += 1;
        report.bytes += n as u64;
    }
    info!(packets = report.packets, bytes = report.bytes, "bulk transmission done");
    Ok(report)
}

/// Write received packets to `output` until the link goes quiet.
///
/// Waits `first_timeout` for the first packet and `inter_packet_timeout` for
/// each later one. Damaged packets are skipped and counted.
pub fn bulk_receive<S, C, W>(
    radio: &mut RadioLink<S, C>,
    mut output: W,
    first_timeout: Duration,
    inter_packet_timeout: Duration,
) -> Result<BulkReport>
where
    S: Duplex,
    C: Clock + Clone,
    W: Write,
{
    let mut report = BulkReport::default();
    let mut timeout = first_timeout;
    let outcome = loop {
        match radio.receive_packet(Some(timeout)) {
            Ok(packet) => {
                if let Err(err) = output.write_all(&packet.data) {
                    break Err(err.into());
                }
                report.packets += 1;
                report.bytes += packet.data.len() as u64;
                timeout = inter_packet_timeout;
            }
            Err(err) if err.is_timeout() => break Ok(()),
            Err(TncError::Block(err)) if is_reception_fault(&err) => {
                warn!(error = %err, "bulk packet dropped");
                report.dropped += 1;
                timeout = inter_packet_timeout;
            }
            Err(err) => break Err(err),
        }
    };
    stop_reception(radio);
    outcome?;
    output.flush()?;

    info!(
        packets = report.packets,
        bytes = report.bytes,
        dropped = report.dropped,
        "bulk reception done"
    );
    Ok(report)
}

/// Send a packet made of `phrase`, truncated or zero padded to `size`
/// bytes, `repetitions` times.
///
/// Failed packets are counted and the test goes on.
pub fn tx_test<S, C>(
    radio: &mut RadioLink<S, C>,
    phrase: &str,
    repetitions: u32,
    size: usize,
) -> Result<TestReport>
where
    S: Duplex,
    C: Clock + Clone,
{
    let mut payload = phrase.as_bytes().to_vec();
    payload.resize(size, 0);
    let blocks_per_packet = block_count(size, radio.parms().packet_length)?;
    info!(repetitions, size, blocks_per_packet, "sending test packets");

    let mut report = TestReport {
        packet_size: size,
        blocks_per_packet,
        ..TestReport::default()
    };
    for index in 0..repetitions {
        match radio.send_packet(&payload) {
            Ok(_) => {
                debug!(packet = index, "test packet sent");
                report.packets_sent += 1;
            }
            Err(err) => {
                warn!(packet = index, error = %err, "test packet failed");
                report.failures += 1;
            }
        }
    }
    Ok(report)
}

/// Receive `count` packets and report their link quality.
///
/// Each attempt waits `timeout` (`None` waits forever). An attempt that
/// fails still counts toward `count`.
pub fn rx_test<S, C>(
    radio: &mut RadioLink<S, C>,
    count: u32,
    timeout: Option<Duration>,
) -> Result<Vec<RxSample>>
where
    S: Duplex,
    C: Clock + Clone,
{
    info!(count, block_size = radio.parms().packet_length, "receiving test packets");
    let mut samples = Vec::with_capacity(count as usize);
    let mut outcome = Ok(());
    for index in 0..count {
        match radio.receive_packet(timeout) {
            Ok(packet) => {
                let text = String::from_utf8_lossy(&packet.data)
                    .trim_end_matches('\0')
                    .to_owned();
                let sample = RxSample {
                    index,
                    size: packet.data.len(),
                    blocks: packet.blocks,
                    rssi_dbm: rssi_dbm(packet.rssi),
                    lqi: packet.crc_lqi & 0x7F,
                    crc_ok: packet.crc_lqi & 0x80 != 0,
                    text,
                    error: None,
                };
                info!(
                    packet = index,
                    size = sample.size,
                    rssi_dbm = sample.rssi_dbm,
                    lqi = sample.lqi,
                    "test packet received"
                );
                samples.push(sample);
            }
            Err(err @ (TncError::Block(_) | TncError::Radio(_))) => {
                warn!(packet = index, error = %err, "test packet not received");
                samples.push(RxSample::failed(index, &err));
            }
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    stop_reception(radio);
    outcome.map(|()| samples)
}

/// Errors that lose one packet but leave the link usable.
fn is_reception_fault(err: &BlockError) -> bool {
    matches!(
        err,
        BlockError::Crc { .. }
            | BlockError::Sequence { .. }
            | BlockError::Rejected { .. }
            | BlockError::NotReceived { .. }
            | BlockError::UnexpectedType { .. }
    )
}

/// Cancel an outstanding RX, re-initialising the radio if that fails.
fn stop_reception<S: Duplex, C: Clock + Clone>(radio: &mut RadioLink<S, C>) {
    if !radio.is_rx_armed() {
        return;
    }
    if let Err(err) = radio.cancel_rx() {
        warn!(error = %err, "cancel reception failed, re-initialising radio");
        if let Err(err) = radio.init() {
            warn!(error = %err, "radio left in an unknown state");
        }
    }
}
