use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tncbridge_block::codec::Block;
use tncbridge_block::packet::parse_rx_reply;
use tncbridge_block::{
    receive_packet, send_packet, BlockConfig, BlockError, BlockLink, BlockType, RadioAck,
    ReceivedBlock, ReceivedPacket, Reassembler,
};
use tncbridge_radio::{rssi_dbm, ActualParameters, RadioParms, RadioStatus};
use tncbridge_transport::{Clock, Duplex};
use tracing::{debug, info, warn};

use crate::error::{Result, TncError};

/// Pause after a successful INIT before the radio is used.
pub const INIT_SETTLE: Duration = Duration::from_millis(100);

/// Deadlines derived from the compiled radio parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Air time of one radio block plus the inter-block delay. Used as the
    /// TX ack timeout and the wait between segments of one packet.
    pub block_time: Duration,
    /// Pause between consecutive segments.
    pub block_delay: Duration,
}

impl LinkTiming {
    pub fn new(parms: &RadioParms, block_delay: Duration) -> Self {
        let delay_us = u32::try_from(block_delay.as_micros()).unwrap_or(u32::MAX);
        let block_time_us = ActualParameters::from_parms(parms).block_time_us(delay_us);
        Self {
            block_time: Duration::from_micros(u64::from(block_time_us)),
            block_delay,
        }
    }
}

/// Traffic counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub blocks_sent: u64,
    pub blocks_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Received blocks or packets dropped (KO, CRC, sequence, timeout).
    pub rx_errors: u64,
    /// Packets whose transmission failed.
    pub tx_errors: u64,
}

/// A session with the radio microcontroller.
///
/// Owns the block link and tracks whether an RX command is outstanding, so
/// that reception is never armed twice and is always cancelled before a
/// transmission. Multi-block packets are reassembled here.
pub struct RadioLink<S, C> {
    link: BlockLink<S, C>,
    parms: RadioParms,
    timing: LinkTiming,
    rx_armed: bool,
    reassembler: Reassembler,
    last_block_at: Option<Duration>,
    stash: VecDeque<ReceivedPacket>,
    stats: LinkStats,
}

impl<S: Duplex, C: Clock + Clone> RadioLink<S, C> {
    /// Wrap `stream` in a block link sized for `parms`.
    pub fn open(stream: S, clock: C, parms: RadioParms, mut config: BlockConfig) -> Result<Self> {
        config.block_size = parms.packet_length;
        let link = BlockLink::connect(stream, clock, config)?;
        Ok(Self::new(link, parms))
    }

    pub fn new(mut link: BlockLink<S, C>, parms: RadioParms) -> Self {
        link.config_mut().block_size = parms.packet_length;
        let timing = LinkTiming::new(&parms, link.config().block_delay);
        Self {
            link,
            parms,
            timing,
            rx_armed: false,
            reassembler: Reassembler::new(),
            last_block_at: None,
            stash: VecDeque::new(),
            stats: LinkStats::default(),
        }
    }

    pub fn parms(&self) -> &RadioParms {
        &self.parms
    }

    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        self.link.clock()
    }

    /// True while an RX command is waiting for its answer.
    pub fn is_rx_armed(&self) -> bool {
        self.rx_armed
    }

    fn block_size(&self) -> u8 {
        self.parms.packet_length
    }

    /// Load the radio parameters into the chip.
    ///
    /// A failed INIT is retried once. A second failure is returned; the
    /// process may carry on, but the radio is in an unknown state.
    pub fn init(&mut self) -> Result<()> {
        if let Err(first) = self.try_init() {
            warn!(error = %first, "radio init failed, retrying once");
            self.link.discard_input();
            self.try_init().map_err(TncError::RadioInit)?;
        }
        self.rx_armed = false;
        self.reassembler.reset();
        self.link.clock().sleep(INIT_SETTLE);

        let actual = ActualParameters::from_parms(&self.parms);
        info!(
            frequency_hz = actual.frequency_hz,
            data_rate = actual.data_rate_baud,
            packet_length = self.parms.packet_length,
            block_time = ?self.timing.block_time,
            "radio initialised"
        );
        Ok(())
    }

    fn try_init(&mut self) -> std::result::Result<(), BlockError> {
        let blob = self.parms.to_bytes();
        self.exchange(BlockType::Init, &blob)?;
        Ok(())
    }

    /// Read and decode the chip status registers.
    pub fn status(&mut self) -> Result<RadioStatus> {
        let reply = self.exchange(BlockType::RadioStatus, &[])?;
        Ok(RadioStatus::decode(&reply.payload)?)
    }

    /// Round-trip `payload` through the microcontroller.
    pub fn echo(&mut self, payload: &[u8]) -> Result<Bytes> {
        let reply = self.exchange(BlockType::EchoTest, payload)?;
        if reply.payload.as_ref() != payload {
            return Err(TncError::EchoMismatch {
                sent: payload.len(),
                received: reply.payload.len(),
            });
        }
        Ok(reply.payload)
    }

    /// Ask for the next radio block. Does nothing if already asked.
    pub fn arm_rx(&mut self) -> Result<()> {
        Ok(self.arm()?)
    }

    fn arm(&mut self) -> std::result::Result<(), BlockError> {
        if self.rx_armed {
            return Ok(());
        }
        self.link
            .send_command(BlockType::Rx, &[self.block_size()])?;
        self.rx_armed = true;
        Ok(())
    }

    /// Withdraw the outstanding RX command.
    ///
    /// A block that completed just before the cancel is kept and handed out
    /// by the next [`poll_packet`](Self::poll_packet).
    pub fn cancel_rx(&mut self) -> Result<()> {
        self.exchange(BlockType::RxCancel, &[])?;
        self.rx_armed = false;
        Ok(())
    }

    /// Send `payload` as one packet. Cancels reception first if armed.
    ///
    /// Returns the number of radio blocks sent.
    pub fn send_packet(&mut self, payload: &[u8]) -> Result<usize> {
        if self.rx_armed {
            self.cancel_rx()?;
        }
        let block_size = self.block_size();
        let timing = self.timing;
        match send_packet(
            &mut self.link,
            payload,
            block_size,
            timing.block_delay,
            timing.block_time,
        ) {
            Ok(blocks) => {
                self.stats.blocks_sent += blocks as u64;
                self.stats.packets_sent += 1;
                Ok(blocks)
            }
            Err(err) => {
                self.stats.tx_errors += 1;
                Err(err.into())
            }
        }
    }

    /// Send one prepared radio block (`[used_len, countdown, data…]`).
    pub fn send_block(&mut self, block: &[u8]) -> Result<RadioAck> {
        if self.rx_armed {
            self.cancel_rx()?;
        }
        let reply = self
            .link
            .request(BlockType::Tx, block, self.timing.block_time)?;
        match reply.kind() {
            Some(BlockType::Tx) => {
                self.stats.blocks_sent += 1;
                Ok(RadioAck::parse(&reply.payload)?)
            }
            Some(BlockType::TxKo) => {
                self.stats.tx_errors += 1;
                Err(BlockError::Rejected {
                    command: BlockType::Tx.name(),
                    reply: BlockType::TxKo.name(),
                }
                .into())
            }
            _ => Err(BlockError::UnexpectedType {
                expected: BlockType::Tx.name(),
                actual: reply.name(),
            }
            .into()),
        }
    }

    /// Wait for a whole packet.
    ///
    /// The first block waits `first_timeout` (`None` waits forever), later
    /// blocks one block time each. On timeout reception stays armed; the
    /// caller decides whether to cancel.
    pub fn receive_packet(&mut self, first_timeout: Option<Duration>) -> Result<ReceivedPacket> {
        if let Some(packet) = self.stash.pop_front() {
            return Ok(packet);
        }
        self.reassembler.reset();
        let inter_block_timeout = self.timing.block_time;
        let blocks_before = self.stats.blocks_received;
        match receive_packet(first_timeout, inter_block_timeout, |timeout| {
            self.next_block(timeout)
        }) {
            Ok(packet) => {
                self.stats.packets_received += 1;
                Ok(packet)
            }
            Err(err) => {
                // Silence before the first segment is not a reception error.
                if !err.is_timeout() || self.stats.blocks_received != blocks_before {
                    self.stats.rx_errors += 1;
                }
                Err(err.into())
            }
        }
    }

    /// Arm reception if needed and wait for one radio block.
    fn next_block(
        &mut self,
        timeout: Option<Duration>,
    ) -> std::result::Result<ReceivedBlock, BlockError> {
        self.arm()?;
        let reply = self.link.read_block(timeout)?;
        self.rx_armed = false;
        let block = parse_rx_reply(&reply)?;
        self.stats.blocks_received += 1;
        self.last_block_at = Some(self.link.clock().now());
        Ok(block)
    }

    /// Non-blocking reception for the scheduler.
    ///
    /// Returns a packet once its last segment is in. Between segments the
    /// RX command is re-issued at once. A packet whose next segment does not
    /// show up within one block time is dropped with a timeout error.
    pub fn poll_packet(&mut self) -> Result<Option<ReceivedPacket>> {
        if let Some(packet) = self.stash.pop_front() {
            return Ok(Some(packet));
        }
        self.check_segment_deadline()?;

        let Some(reply) = self.link.poll_block()? else {
            return Ok(None);
        };
        self.rx_armed = false;
        match self.accept_block(&reply)? {
            Some(packet) => Ok(Some(packet)),
            None => {
                self.arm_rx()?;
                Ok(None)
            }
        }
    }

    fn check_segment_deadline(&mut self) -> Result<()> {
        if !self.reassembler.in_progress() {
            return Ok(());
        }
        let Some(at) = self.last_block_at else {
            return Ok(());
        };
        if self.link.clock().now().saturating_sub(at) > self.timing.block_time {
            self.reassembler.reset();
            self.stats.rx_errors += 1;
            warn!("next segment did not arrive, dropping partial packet");
            return Err(BlockError::Timeout(self.timing.block_time).into());
        }
        Ok(())
    }

    fn accept_block(&mut self, reply: &Block) -> Result<Option<ReceivedPacket>> {
        let block = match parse_rx_reply(reply) {
            Ok(block) => block,
            Err(err) => {
                self.stats.rx_errors += 1;
                return Err(err.into());
            }
        };
        self.stats.blocks_received += 1;
        self.last_block_at = Some(self.link.clock().now());

        match self.reassembler.push(block) {
            Ok(Some(packet)) => {
                self.stats.packets_received += 1;
                debug!(
                    size = packet.data.len(),
                    blocks = packet.blocks,
                    rssi_dbm = rssi_dbm(packet.rssi),
                    lqi = packet.crc_lqi & 0x7F,
                    "packet received"
                );
                Ok(Some(packet))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.stats.rx_errors += 1;
                Err(err.into())
            }
        }
    }

    /// Send a command and wait for the answer of the same type.
    ///
    /// RX answers that were already on their way are absorbed on the side.
    fn exchange(
        &mut self,
        kind: BlockType,
        payload: &[u8],
    ) -> std::result::Result<Block, BlockError> {
        self.link.send_command(kind, payload)?;
        let timeout = self.link.config().command_timeout;
        let deadline = self.link.clock().now() + timeout;
        loop {
            let remaining = deadline.saturating_sub(self.link.clock().now());
            let reply = self.link.read_block(Some(remaining))?;
            match reply.kind() {
                Some(k) if k == kind => return Ok(reply),
                Some(BlockType::Rx) | Some(BlockType::RxKo) => self.absorb_stale(&reply),
                Some(BlockType::Error) => {
                    let code = reply.payload.first().copied().unwrap_or(kind.code());
                    return Err(BlockError::Unsupported(code));
                }
                _ => {
                    return Err(BlockError::UnexpectedType {
                        expected: kind.name(),
                        actual: reply.name(),
                    })
                }
            }
        }
    }

    fn absorb_stale(&mut self, reply: &Block) {
        self.rx_armed = false;
        match self.accept_block(reply) {
            Ok(Some(packet)) => {
                debug!(size = packet.data.len(), "kept packet that crossed a command");
                self.stash.push_back(packet);
            }
            Ok(None) => {}
            Err(err) => debug!(error = %err, "dropped reception that crossed a command"),
        }
    }
}

impl<S, C> std::fmt::Debug for RadioLink<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioLink")
            .field("parms", &self.parms)
            .field("timing", &self.timing)
            .field("rx_armed", &self.rx_armed)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tncbridge_block::segment;
    use tncbridge_firmware::sim::{Bench, SoftPort};
    use tncbridge_firmware::Mode;
    use tncbridge_radio::status::MARC_IDLE;
    use tncbridge_radio::{compile, RadioIntent, PARMS_WIRE_SIZE};
    use tncbridge_transport::{pair, ManualClock};

    use super::*;

    fn parms(packet_length: u8) -> RadioParms {
        compile(&RadioIntent {
            packet_length,
            ..RadioIntent::default()
        })
    }

    fn radio(
        bench: &Arc<Mutex<Bench>>,
        station: usize,
        clock: &ManualClock,
        packet_length: u8,
    ) -> RadioLink<SoftPort, ManualClock> {
        let port = Bench::port(bench, station);
        let mut radio = RadioLink::open(
            port,
            clock.clone(),
            parms(packet_length),
            BlockConfig::default(),
        )
        .expect("link should open");
        radio.init().expect("init should succeed");
        radio
    }

    #[test]
    fn timing_follows_block_air_time() {
        let p = parms(250);
        let timing = LinkTiming::new(&p, Duration::from_millis(10));
        let actual = ActualParameters::from_parms(&p);
        assert_eq!(
            timing.block_time,
            Duration::from_micros(u64::from(actual.byte_time_us) * 252 + 10_000)
        );
    }

    #[test]
    fn status_and_echo() {
        let bench = Bench::shared(1);
        let clock = ManualClock::new();
        let mut radio = radio(&bench, 0, &clock, 32);

        let status = radio.status().expect("status should decode");
        assert_eq!(status.marc_state, MARC_IDLE);

        let echoed = radio.echo(b"ping").expect("echo should succeed");
        assert_eq!(echoed.as_ref(), b"ping");
    }

    #[test]
    fn init_gives_up_after_one_retry() {
        let (host, device) = pair();
        let clock = ManualClock::new();
        let mut radio = RadioLink::open(host, clock, parms(32), BlockConfig::default())
            .expect("link should open");

        let err = radio.init().expect_err("silent device should fail");
        assert!(matches!(err, TncError::RadioInit(ref e) if e.is_timeout()));
        assert_eq!(device.drain().len(), 2 * (2 + PARMS_WIRE_SIZE));
    }

    #[test]
    fn single_block_packet_crosses() {
        let bench = Bench::shared(2);
        let clock = ManualClock::new();
        let mut a = radio(&bench, 0, &clock, 32);
        let mut b = radio(&bench, 1, &clock, 32);

        b.arm_rx().unwrap();
        assert_eq!(a.send_packet(b"hello").unwrap(), 1);

        let packet = (0..10)
            .find_map(|_| b.poll_packet().unwrap())
            .expect("packet should arrive");
        assert_eq!(packet.data.as_ref(), b"hello");
        assert_eq!(packet.blocks, 1);
        assert!(!b.is_rx_armed());
        assert_eq!(b.stats().packets_received, 1);
        assert_eq!(a.stats().packets_sent, 1);
    }

    #[test]
    fn segments_are_reassembled_between_polls() {
        let bench = Bench::shared(2);
        let clock = ManualClock::new();
        let mut a = radio(&bench, 0, &clock, 32);
        let mut b = radio(&bench, 1, &clock, 32);
        let payload: Vec<u8> = (0..70u8).collect();
        let segments = segment(&payload, 32).unwrap();
        assert_eq!(segments.len(), 3);

        b.arm_rx().unwrap();
        let mut received = None;
        for seg in &segments {
            a.send_block(seg).expect("segment should be acked");
            for _ in 0..3 {
                if let Some(packet) = b.poll_packet().unwrap() {
                    received = Some(packet);
                }
            }
        }

        let packet = received.expect("packet should complete");
        assert_eq!(packet.data.as_ref(), payload.as_slice());
        assert_eq!(packet.blocks, 3);
        assert_eq!(b.stats().blocks_received, 3);
    }

    #[test]
    fn missing_segment_times_out() {
        let bench = Bench::shared(2);
        let clock = ManualClock::new();
        let mut a = radio(&bench, 0, &clock, 32);
        let mut b = radio(&bench, 1, &clock, 32);
        let segments = segment(&[7u8; 40], 32).unwrap();

        b.arm_rx().unwrap();
        a.send_block(&segments[0]).unwrap();
        assert!(b.poll_packet().unwrap().is_none());
        assert!(b.is_rx_armed());

        clock.advance(b.timing().block_time + Duration::from_millis(1));
        let err = b.poll_packet().expect_err("partial packet should expire");
        assert!(err.is_timeout());
        assert_eq!(b.stats().rx_errors, 1);
    }

    #[test]
    fn receive_packet_waits_for_one_packet() {
        let bench = Bench::shared(2);
        let clock = ManualClock::new();
        let mut a = radio(&bench, 0, &clock, 32);
        let mut b = radio(&bench, 1, &clock, 32);

        b.arm_rx().unwrap();
        a.send_packet(b"hi").unwrap();
        let packet = b
            .receive_packet(Some(Duration::from_millis(5)))
            .expect("packet should arrive");
        assert_eq!(packet.data.as_ref(), b"hi");
        assert_eq!(b.stats().packets_received, 1);
        assert!(!b.is_rx_armed());
    }

    #[test]
    fn receive_timeout_stays_armed() {
        let bench = Bench::shared(1);
        let clock = ManualClock::new();
        let mut b = radio(&bench, 0, &clock, 32);

        let err = b
            .receive_packet(Some(Duration::from_millis(5)))
            .expect_err("nothing on air");
        assert!(err.is_timeout());
        assert!(b.is_rx_armed());
        assert_eq!(b.stats().rx_errors, 0);
    }

    #[test]
    fn cancel_keeps_packet_that_crossed() {
        let bench = Bench::shared(2);
        let clock = ManualClock::new();
        let mut a = radio(&bench, 0, &clock, 32);
        let mut b = radio(&bench, 1, &clock, 32);

        b.arm_rx().unwrap();
        a.send_packet(b"crossing").unwrap();
        // Let B's answer reach its USB queue before the cancel goes out.
        for _ in 0..50 {
            let mut guard = bench.lock().unwrap();
            if guard.device(1).map(|d| d.mode()) == Some(Mode::Idle) {
                break;
            }
            guard.pump();
        }
        b.cancel_rx().expect("cancel should be echoed");
        assert!(!b.is_rx_armed());

        let packet = b.poll_packet().unwrap().expect("stashed packet");
        assert_eq!(packet.data.as_ref(), b"crossing");
    }

    #[test]
    fn corrupted_packet_is_counted_and_dropped() {
        let bench = Bench::shared(2);
        let clock = ManualClock::new();
        let mut a = radio(&bench, 0, &clock, 32);
        let mut b = radio(&bench, 1, &clock, 32);
        bench.lock().unwrap().ether_mut().corrupt = 1;

        b.arm_rx().unwrap();
        a.send_packet(b"noise").unwrap();
        let err = (0..10)
            .find_map(|_| b.poll_packet().err())
            .expect("CRC error should surface");
        assert!(matches!(
            err,
            TncError::Block(BlockError::Crc { countdown: 0 })
        ));
        assert_eq!(b.stats().rx_errors, 1);
    }
}
