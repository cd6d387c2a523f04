//! Block dispatcher: one USB block in, zero or more blocks out.

use heapless::{Deque, Vec};
use tncbridge_block::command::{BlockType, HEADER_SIZE};
use tncbridge_radio::{RadioParms, NUM_STATUS_REGS};

use crate::chip::{events_from_port, InterruptLines, LinePins, RadioChip};
use crate::streamer::{reply, Event, Mode, Reply, Streamer, BLOCK_CAPACITY};

/// Replies waiting for the USB endpoint.
pub const OUTBOX_DEPTH: usize = 4;

/// Bytes buffered from the USB endpoint while a block is incomplete.
const ASSEMBLY_CAPACITY: usize = 2 * BLOCK_CAPACITY;

/// Cuts the USB byte stream into whole blocks.
#[derive(Debug, Default)]
pub struct BlockAssembler {
    buf: Vec<u8, ASSEMBLY_CAPACITY>,
}

impl BlockAssembler {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append received bytes. Returns how many fit.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(ASSEMBLY_CAPACITY - self.buf.len());
        self.buf.extend_from_slice(&bytes[..n]).ok();
        n
    }

    /// Take the next complete `[type, size, payload…]` block.
    pub fn next_block(&mut self) -> Option<Reply> {
        if self.buf.len() < HEADER_SIZE {
            return None;
        }
        let total = HEADER_SIZE + usize::from(self.buf[1]);
        if self.buf.len() < total {
            return None;
        }
        let mut block = Reply::new();
        block.extend_from_slice(&self.buf[..total]).ok()?;
        let remaining = self.buf.len() - total;
        self.buf.rotate_left(total);
        self.buf.truncate(remaining);
        Some(block)
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Firmware state: the chip, its interrupt lines and the streamer.
#[derive(Debug)]
pub struct Device<R, L> {
    chip: R,
    lines: L,
    streamer: Streamer,
    outbox: Deque<Reply, OUTBOX_DEPTH>,
    parms: Option<RadioParms>,
    dropped: u32,
}

impl<R: RadioChip, L: InterruptLines> Device<R, L> {
    pub fn new(chip: R, lines: L) -> Self {
        Self {
            chip,
            lines,
            streamer: Streamer::new(),
            outbox: Deque::new(),
            parms: None,
            dropped: 0,
        }
    }

    pub fn chip(&self) -> &R {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut R {
        &mut self.chip
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    pub fn mode(&self) -> Mode {
        self.streamer.mode()
    }

    /// Parameters of the last successful INIT.
    pub fn parms(&self) -> Option<&RadioParms> {
        self.parms.as_ref()
    }

    /// Replies lost because the outbox was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Process one complete block from the host.
    pub fn handle_block(&mut self, block: &[u8]) {
        let Some((&kind, rest)) = block.split_first() else {
            return;
        };
        let size = rest.first().copied().map_or(0, usize::from);
        let payload = rest.get(1..).unwrap_or(&[]);
        let payload = &payload[..size.min(payload.len())];

        match BlockType::from_u8(kind) {
            Some(BlockType::Init) => self.init(payload),
            Some(BlockType::Tx) => {
                let started = self
                    .streamer
                    .start_tx(payload, &mut self.chip, &mut self.lines);
                if started.is_err() {
                    self.report_failure(BlockType::TxKo);
                }
            }
            Some(BlockType::Rx) => match payload.first() {
                Some(&block_size) => {
                    let started = self
                        .streamer
                        .start_rx(block_size, &mut self.chip, &mut self.lines);
                    if started.is_err() {
                        self.report_failure(BlockType::RxKo);
                    }
                }
                None => self.push(reply(BlockType::Error, &[kind])),
            },
            Some(BlockType::RxCancel) => self.on_event(Event::Cancel),
            Some(BlockType::RadioStatus) => {
                let mut regs = [0u8; NUM_STATUS_REGS];
                self.chip.read_status(&mut regs);
                self.push(reply(BlockType::RadioStatus, &regs));
            }
            Some(BlockType::EchoTest) => self.push(reply(BlockType::EchoTest, payload)),
            _ => self.push(reply(BlockType::Error, &[kind])),
        }
    }

    /// Feed one line event to the streamer.
    pub fn on_event(&mut self, event: Event) {
        if let Some(answer) = self.streamer.handle(event, &mut self.chip, &mut self.lines) {
            self.push(answer);
        }
    }

    /// Service the port interrupt from its flag and edge-select registers.
    pub fn on_port_interrupt(&mut self, flags: u8, edge_select: u8, pins: &LinePins) {
        for event in events_from_port(flags, edge_select, pins) {
            self.on_event(event);
        }
    }

    /// Next block to write to the USB endpoint.
    pub fn poll_reply(&mut self) -> Option<Reply> {
        self.outbox.pop_front()
    }

    fn init(&mut self, payload: &[u8]) {
        let Ok(parms) = RadioParms::from_bytes(payload) else {
            self.push(reply(BlockType::Error, &[BlockType::Init.code()]));
            return;
        };
        if self.streamer.mode() != Mode::Idle {
            // Reconfiguring aborts the transfer; its answer is not wanted.
            let _ = self
                .streamer
                .handle(Event::Cancel, &mut self.chip, &mut self.lines);
        }
        self.chip.configure(&parms);
        self.parms = Some(parms);
        self.push(reply(BlockType::Init, &[]));
    }

    fn report_failure(&mut self, kind: BlockType) {
        let status = self.chip.marc_state();
        let answer = self.streamer.status_reply(kind, status, &mut self.lines);
        self.push(answer);
    }

    fn push(&mut self, answer: Reply) {
        if self.outbox.push_back(answer).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }
}
