use std::collections::VecDeque;

use tncbridge_radio::consts::FIFO_SIZE;
use tncbridge_radio::status::{MARC_IDLE, MARC_RX, MARC_TX};
use tncbridge_radio::{RadioParms, NUM_STATUS_REGS};

use crate::chip::{
    Edge, InterruptLines, Line, LinePins, RadioChip, Strobe, ThresholdMode, PORT2_PINS,
    RX_THRESHOLD, TX_THRESHOLD,
};
use crate::streamer::Event;

const MARC_RXFIFO_OVERFLOW: u8 = 17;
const MARC_TXFIFO_UNDERFLOW: u8 = 22;

/// Bytes moved between FIFO and air on each tick.
pub const BYTES_PER_TICK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Tx,
    Rx,
    TxUnderflow,
    RxOverflow,
}

/// What one tick produced.
#[derive(Debug, Default)]
pub struct Tick {
    /// Line transitions, in order.
    pub edges: Vec<(Line, Edge)>,
    /// A packet that left the antenna.
    pub frame: Option<Vec<u8>>,
}

/// Behavioural model of the transceiver: FIFOs, packet handling and the two
/// GDO outputs. No RF, no timing beyond [`BYTES_PER_TICK`].
#[derive(Debug)]
pub struct SimChip {
    state: State,
    tx_fifo: VecDeque<u8>,
    rx_fifo: VecDeque<u8>,
    tx_underflow: bool,
    rx_overflow: bool,
    packet_length: u8,
    threshold_mode: ThresholdMode,
    parms: Option<RadioParms>,
    sent: Vec<u8>,
    incoming: VecDeque<u8>,
    gdo0: bool,
    gdo2: bool,
    last_rssi: u8,
    last_crc_lqi: u8,
}

impl Default for SimChip {
    fn default() -> Self {
        Self {
            state: State::Idle,
            tx_fifo: VecDeque::new(),
            rx_fifo: VecDeque::new(),
            tx_underflow: false,
            rx_overflow: false,
            packet_length: 0,
            threshold_mode: ThresholdMode::Rx,
            parms: None,
            sent: Vec::new(),
            incoming: VecDeque::new(),
            gdo0: false,
            gdo2: false,
            last_rssi: 0,
            last_crc_lqi: 0,
        }
    }
}

impl SimChip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parms(&self) -> Option<&RadioParms> {
        self.parms.as_ref()
    }

    /// Listening and not already taking in a packet.
    pub fn is_listening(&self) -> bool {
        self.state == State::Rx && self.incoming.is_empty() && !self.gdo0
    }

    /// Start taking in a packet from the air.
    ///
    /// The chip keeps `packet_length` bytes (padding with zeros) and appends
    /// the RSSI and CRC/LQI bytes. Ignored unless listening.
    pub fn receive(&mut self, frame: &[u8], rssi: u8, crc_lqi: u8) -> bool {
        if !self.is_listening() {
            return false;
        }
        let len = usize::from(self.packet_length);
        self.incoming.extend(frame.iter().copied().chain(std::iter::repeat(0)).take(len));
        self.incoming.extend([rssi, crc_lqi]);
        self.last_rssi = rssi;
        self.last_crc_lqi = crc_lqi;
        true
    }

    /// Advance the air by one step.
    pub fn tick(&mut self) -> Tick {
        let mut tick = Tick::default();
        // Pick up FIFO level changes made by the CPU since the last tick.
        self.update_threshold(&mut tick.edges);

        match self.state {
            State::Tx => self.tick_tx(&mut tick),
            State::Rx if !self.incoming.is_empty() => self.tick_rx(&mut tick),
            _ => {}
        }
        tick
    }

    fn tick_tx(&mut self, tick: &mut Tick) {
        if !self.gdo0 {
            // Preamble and sync word.
            self.set_gdo0(true, &mut tick.edges);
            return;
        }
        let len = usize::from(self.packet_length);
        for _ in 0..BYTES_PER_TICK {
            if self.sent.len() == len {
                break;
            }
            match self.tx_fifo.pop_front() {
                Some(byte) => self.sent.push(byte),
                None => {
                    self.tx_underflow = true;
                    self.state = State::TxUnderflow;
                    break;
                }
            }
        }
        self.update_threshold(&mut tick.edges);

        if self.state == State::TxUnderflow {
            self.sent.clear();
            self.set_gdo0(false, &mut tick.edges);
        } else if self.sent.len() == len {
            self.state = State::Idle;
            tick.frame = Some(std::mem::take(&mut self.sent));
            self.set_gdo0(false, &mut tick.edges);
        }
    }

    fn tick_rx(&mut self, tick: &mut Tick) {
        if !self.gdo0 {
            self.set_gdo0(true, &mut tick.edges);
            return;
        }
        for _ in 0..BYTES_PER_TICK {
            let Some(byte) = self.incoming.pop_front() else {
                break;
            };
            if self.rx_fifo.len() == FIFO_SIZE {
                self.rx_overflow = true;
                self.state = State::RxOverflow;
                self.incoming.clear();
                break;
            }
            self.rx_fifo.push_back(byte);
        }
        self.update_threshold(&mut tick.edges);

        if self.incoming.is_empty() {
            if self.state == State::Rx {
                self.state = State::Idle;
            }
            self.set_gdo0(false, &mut tick.edges);
        }
    }

    fn set_gdo0(&mut self, level: bool, edges: &mut Vec<(Line, Edge)>) {
        if level != self.gdo0 {
            self.gdo0 = level;
            edges.push((Line::Packet, if level { Edge::Rising } else { Edge::Falling }));
        }
    }

    fn update_threshold(&mut self, edges: &mut Vec<(Line, Edge)>) {
        let level = match self.threshold_mode {
            ThresholdMode::Tx => self.tx_fifo.len() >= TX_THRESHOLD,
            ThresholdMode::Rx => self.rx_fifo.len() >= RX_THRESHOLD,
        };
        if level != self.gdo2 {
            self.gdo2 = level;
            edges.push((Line::Threshold, if level { Edge::Rising } else { Edge::Falling }));
        }
    }

    fn fifo_byte(flag: bool, len: usize) -> u8 {
        (u8::from(flag) << 7) | len.min(0x7F) as u8
    }
}

impl RadioChip for SimChip {
    fn configure(&mut self, parms: &RadioParms) {
        self.parms = Some(*parms);
        self.packet_length = parms.packet_length;
    }

    fn strobe(&mut self, strobe: Strobe) {
        match strobe {
            Strobe::Idle => {
                self.state = State::Idle;
                self.sent.clear();
                self.incoming.clear();
                self.gdo0 = false;
            }
            Strobe::Tx => {
                self.state = State::Tx;
                self.sent.clear();
                self.gdo0 = false;
            }
            Strobe::Rx => {
                self.state = State::Rx;
                self.gdo0 = false;
            }
            Strobe::FlushTx => {
                self.tx_fifo.clear();
                self.tx_underflow = false;
            }
            Strobe::FlushRx => {
                self.rx_fifo.clear();
                self.rx_overflow = false;
            }
        }
    }

    fn set_packet_length(&mut self, len: u8) {
        self.packet_length = len;
    }

    fn set_threshold_mode(&mut self, mode: ThresholdMode) {
        self.threshold_mode = mode;
    }

    fn write_tx_fifo(&mut self, data: &[u8]) {
        for &byte in data {
            if self.tx_fifo.len() == FIFO_SIZE {
                break;
            }
            self.tx_fifo.push_back(byte);
        }
    }

    fn read_rx_fifo(&mut self, buf: &mut [u8]) {
        for slot in buf {
            *slot = self.rx_fifo.pop_front().unwrap_or(0);
        }
    }

    fn tx_bytes(&mut self) -> u8 {
        Self::fifo_byte(self.tx_underflow, self.tx_fifo.len())
    }

    fn rx_bytes(&mut self) -> u8 {
        Self::fifo_byte(self.rx_overflow, self.rx_fifo.len())
    }

    fn marc_state(&mut self) -> u8 {
        match self.state {
            State::Idle => MARC_IDLE,
            State::Tx => MARC_TX,
            State::Rx => MARC_RX,
            State::TxUnderflow => MARC_TXFIFO_UNDERFLOW,
            State::RxOverflow => MARC_RXFIFO_OVERFLOW,
        }
    }

    fn read_status(&mut self, regs: &mut [u8; NUM_STATUS_REGS]) {
        regs.fill(0);
        regs[1] = 0x14;
        regs[3] = self.last_crc_lqi;
        regs[4] = self.last_rssi;
        regs[5] = self.marc_state();
        regs[8] = (u8::from(self.gdo2) << 2) | u8::from(self.gdo0);
        regs[9] = 0x94;
        regs[10] = self.tx_bytes();
        regs[11] = self.rx_bytes();
    }
}

/// Port registers for the two lines.
#[derive(Debug, Clone)]
pub struct SimLines {
    pins: LinePins,
    input: u8,
    flags: u8,
    enable: u8,
    edge_select: u8,
}

impl Default for SimLines {
    fn default() -> Self {
        Self::new(PORT2_PINS)
    }
}

impl SimLines {
    pub fn new(pins: LinePins) -> Self {
        Self {
            pins,
            input: 0,
            flags: 0,
            enable: 0,
            edge_select: 0,
        }
    }

    /// Apply a line transition. Returns the event if the line is armed for
    /// that edge; the flag is then considered serviced.
    pub fn latch(&mut self, line: Line, edge: Edge) -> Option<Event> {
        let mask = self.pins.mask(line);
        match edge {
            Edge::Rising => self.input |= mask,
            Edge::Falling => self.input &= !mask,
        }
        let selected = if self.edge_select & mask != 0 {
            Edge::Falling
        } else {
            Edge::Rising
        };
        if self.enable & mask == 0 || selected != edge {
            return None;
        }
        self.flags &= !mask;
        Some(Event::new(line, edge))
    }

    pub fn is_armed(&self, line: Line) -> bool {
        self.enable & self.pins.mask(line) != 0
    }
}

impl InterruptLines for SimLines {
    fn arm(&mut self, line: Line, edge: Edge) {
        let mask = self.pins.mask(line);
        match edge {
            Edge::Rising => self.edge_select &= !mask,
            Edge::Falling => self.edge_select |= mask,
        }
        self.flags &= !mask;
        self.enable |= mask;
    }

    fn disarm(&mut self, line: Line) {
        self.enable &= !self.pins.mask(line);
    }

    fn clear_pending(&mut self) {
        self.flags &= !(self.pins.packet | self.pins.threshold);
    }

    fn snapshot(&mut self) -> [u8; 4] {
        [self.input, self.flags, self.enable, self.edge_select]
    }
}
