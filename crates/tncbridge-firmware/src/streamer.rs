//! Interrupt-driven streaming through the radio FIFOs.
//!
//! TX preloads the FIFO, refills it on each threshold falling edge and
//! reports on the packet line's falling edge. RX drains a chunk on each
//! threshold rising edge and the rest on the packet line's falling edge.
//! [`Streamer::handle`] is the whole transition function; the interrupt
//! vector only decodes port flags into [`Event`]s.

use heapless::Vec;
use tncbridge_block::command::{BlockType, HEADER_SIZE, MAX_PAYLOAD, TX_ACK_LEN};
use tncbridge_radio::consts::FIFO_SIZE;

use crate::chip::{Edge, InterruptLines, Line, RadioChip, Strobe, ThresholdMode};
use crate::error::{Result, StreamError};

/// Largest block on the USB link, header included.
pub const BLOCK_CAPACITY: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Bytes written on each TX threshold interrupt.
pub const TX_CHUNK: usize = 30;
/// Bytes read on each RX threshold interrupt. One byte stays in the FIFO
/// until the end of packet.
pub const RX_CHUNK: usize = 31;

/// RSSI and CRC/LQI bytes appended by the chip to every received packet.
const APPENDED_STATUS: usize = 2;

/// Largest radio block that can be received: its answer also carries the
/// two appended status bytes.
pub const MAX_RX_BLOCK: usize = MAX_PAYLOAD - APPENDED_STATUS;

/// An outgoing block: `[type, size, payload…]`.
pub type Reply = Vec<u8, BLOCK_CAPACITY>;

/// Build a reply block. Payload beyond [`MAX_PAYLOAD`] is cut.
pub fn reply(kind: BlockType, payload: &[u8]) -> Reply {
    let payload = &payload[..payload.len().min(MAX_PAYLOAD)];
    let mut out = Reply::new();
    // Header plus at most MAX_PAYLOAD bytes always fits.
    out.extend_from_slice(&[kind.code(), payload.len() as u8]).ok();
    out.extend_from_slice(payload).ok();
    out
}

/// An edge seen on one of the two lines, or a host request to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PacketRising,
    PacketFalling,
    ThresholdRising,
    ThresholdFalling,
    /// RX_CANCEL from the host: abort whatever is in progress.
    Cancel,
}

impl Event {
    pub const fn new(line: Line, edge: Edge) -> Self {
        match (line, edge) {
            (Line::Packet, Edge::Rising) => Event::PacketRising,
            (Line::Packet, Edge::Falling) => Event::PacketFalling,
            (Line::Threshold, Edge::Rising) => Event::ThresholdRising,
            (Line::Threshold, Edge::Falling) => Event::ThresholdFalling,
        }
    }
}

/// Edge counters, reset at each TX or RX setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub packet_rising: u8,
    pub packet_falling: u8,
    pub threshold_rising: u8,
    pub threshold_falling: u8,
}

impl Counters {
    fn count(&mut self, event: Event) {
        let slot = match event {
            Event::PacketRising => &mut self.packet_rising,
            Event::PacketFalling => &mut self.packet_falling,
            Event::ThresholdRising => &mut self.threshold_rising,
            Event::ThresholdFalling => &mut self.threshold_falling,
            Event::Cancel => return,
        };
        *slot = slot.wrapping_add(1);
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [
            self.packet_rising,
            self.packet_falling,
            self.threshold_rising,
            self.threshold_falling,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Tx,
    Rx,
}

/// Streaming context shared between the main loop and the port interrupt.
#[derive(Debug, Default)]
pub struct Streamer {
    mode: Mode,
    buf: Vec<u8, BLOCK_CAPACITY>,
    /// TX: next byte of `buf` to load into the FIFO.
    loaded: usize,
    /// RX: bytes expected, appended status included.
    expected: usize,
    counters: Counters,
}

impl Streamer {
    pub const fn new() -> Self {
        Self {
            mode: Mode::Idle,
            buf: Vec::new(),
            loaded: 0,
            expected: 0,
            counters: Counters {
                packet_rising: 0,
                packet_falling: 0,
                threshold_rising: 0,
                threshold_falling: 0,
            },
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Start transmitting one radio block.
    pub fn start_tx<R: RadioChip, L: InterruptLines>(
        &mut self,
        block: &[u8],
        chip: &mut R,
        lines: &mut L,
    ) -> Result<()> {
        if self.mode != Mode::Idle {
            return Err(StreamError::Busy(self.mode));
        }
        if block.is_empty() {
            return Err(StreamError::EmptyBlock);
        }
        if block.len() > MAX_PAYLOAD {
            return Err(StreamError::BlockTooLarge {
                len: block.len(),
                max: MAX_PAYLOAD,
            });
        }

        self.buf.clear();
        self.buf
            .extend_from_slice(block)
            .map_err(|_| StreamError::BlockTooLarge {
                len: block.len(),
                max: MAX_PAYLOAD,
            })?;
        self.counters = Counters::default();

        chip.strobe(Strobe::Idle);
        chip.strobe(Strobe::FlushTx);
        chip.set_packet_length(block.len() as u8);
        chip.set_threshold_mode(ThresholdMode::Tx);

        self.loaded = block.len().min(FIFO_SIZE - 1);
        chip.write_tx_fifo(&self.buf[..self.loaded]);

        lines.clear_pending();
        if self.loaded < self.buf.len() {
            lines.arm(Line::Threshold, Edge::Falling);
        }
        lines.arm(Line::Packet, Edge::Rising);

        self.mode = Mode::Tx;
        chip.strobe(Strobe::Tx);
        Ok(())
    }

    /// Arm reception of one radio block of `block_size` bytes.
    ///
    /// An armed reception is restarted.
    pub fn start_rx<R: RadioChip, L: InterruptLines>(
        &mut self,
        block_size: u8,
        chip: &mut R,
        lines: &mut L,
    ) -> Result<()> {
        match self.mode {
            Mode::Tx => return Err(StreamError::Busy(Mode::Tx)),
            Mode::Rx => self.stop(chip, lines),
            Mode::Idle => {}
        }
        if block_size == 0 {
            return Err(StreamError::EmptyBlock);
        }
        if usize::from(block_size) > MAX_RX_BLOCK {
            return Err(StreamError::BlockTooLarge {
                len: usize::from(block_size),
                max: MAX_RX_BLOCK,
            });
        }

        self.buf.clear();
        self.expected = usize::from(block_size) + APPENDED_STATUS;
        self.counters = Counters::default();

        chip.strobe(Strobe::Idle);
        chip.strobe(Strobe::FlushRx);
        chip.set_packet_length(block_size);
        chip.set_threshold_mode(ThresholdMode::Rx);

        lines.clear_pending();
        lines.arm(Line::Threshold, Edge::Rising);
        lines.arm(Line::Packet, Edge::Rising);

        self.mode = Mode::Rx;
        chip.strobe(Strobe::Rx);
        Ok(())
    }

    fn stop<R: RadioChip, L: InterruptLines>(&mut self, chip: &mut R, lines: &mut L) {
        lines.disarm(Line::Packet);
        lines.disarm(Line::Threshold);
        lines.clear_pending();
        chip.strobe(Strobe::Idle);
        chip.strobe(Strobe::FlushRx);
        chip.strobe(Strobe::FlushTx);
        self.buf.clear();
        self.mode = Mode::Idle;
    }

    /// Advance on one event. Returns the block to send to the host when the
    /// transfer ends, or `[RX_CANCEL, 0]` for a cancel.
    ///
    /// Edges are counted only while a transfer is running.
    pub fn handle<R: RadioChip, L: InterruptLines>(
        &mut self,
        event: Event,
        chip: &mut R,
        lines: &mut L,
    ) -> Option<Reply> {
        if self.mode != Mode::Idle {
            self.counters.count(event);
        }
        match (self.mode, event) {
            (_, Event::Cancel) => {
                self.stop(chip, lines);
                Some(reply(BlockType::RxCancel, &[]))
            }
            (Mode::Tx, Event::ThresholdFalling) => {
                self.refill(chip, lines);
                None
            }
            (Mode::Rx, Event::ThresholdRising) => {
                self.drain(chip, RX_CHUNK);
                None
            }
            (Mode::Tx | Mode::Rx, Event::PacketRising) => {
                lines.arm(Line::Packet, Edge::Falling);
                None
            }
            (Mode::Tx, Event::PacketFalling) => Some(self.finish_tx(chip, lines)),
            (Mode::Rx, Event::PacketFalling) => Some(self.finish_rx(chip, lines)),
            _ => None,
        }
    }

    /// Status block for TX, TX_KO and RX_KO answers.
    pub fn status_reply<L: InterruptLines>(&self, kind: BlockType, status: u8, lines: &mut L) -> Reply {
        let mut payload = [0u8; TX_ACK_LEN];
        payload[0] = status;
        payload[1..5].copy_from_slice(&self.counters.to_bytes());
        payload[5..9].copy_from_slice(&lines.snapshot());
        reply(kind, &payload)
    }

    fn refill<R: RadioChip, L: InterruptLines>(&mut self, chip: &mut R, lines: &mut L) {
        let end = self.buf.len().min(self.loaded + TX_CHUNK);
        chip.write_tx_fifo(&self.buf[self.loaded..end]);
        self.loaded = end;
        if self.loaded == self.buf.len() {
            lines.disarm(Line::Threshold);
        }
    }

    /// Read up to `limit` bytes, never past the expected length.
    fn drain<R: RadioChip>(&mut self, chip: &mut R, limit: usize) {
        let available = usize::from(chip.rx_bytes() & 0x7F);
        let wanted = self.expected.saturating_sub(self.buf.len());
        let n = available.min(limit).min(wanted).min(FIFO_SIZE);
        if n == 0 {
            return;
        }
        let mut chunk = [0u8; FIFO_SIZE];
        chip.read_rx_fifo(&mut chunk[..n]);
        // `expected` never exceeds the buffer capacity.
        self.buf.extend_from_slice(&chunk[..n]).ok();
    }

    fn finish_tx<R: RadioChip, L: InterruptLines>(&mut self, chip: &mut R, lines: &mut L) -> Reply {
        let status = chip.marc_state();
        lines.disarm(Line::Packet);
        lines.disarm(Line::Threshold);

        let tx_bytes = chip.tx_bytes();
        let failed = tx_bytes != 0 || self.loaded < self.buf.len();
        if failed {
            chip.strobe(Strobe::Idle);
            chip.strobe(Strobe::FlushTx);
        }
        self.mode = Mode::Idle;

        let kind = if failed { BlockType::TxKo } else { BlockType::Tx };
        self.status_reply(kind, status, lines)
    }

    fn finish_rx<R: RadioChip, L: InterruptLines>(&mut self, chip: &mut R, lines: &mut L) -> Reply {
        let status = chip.marc_state();
        lines.disarm(Line::Packet);
        lines.disarm(Line::Threshold);

        let overflow = chip.rx_bytes() & 0x80 != 0;
        if !overflow {
            self.drain(chip, FIFO_SIZE);
        }
        self.mode = Mode::Idle;

        if overflow || self.buf.len() <= APPENDED_STATUS {
            chip.strobe(Strobe::Idle);
            chip.strobe(Strobe::FlushRx);
            return self.status_reply(BlockType::RxKo, status, lines);
        }
        reply(BlockType::Rx, &self.buf)
    }
}
