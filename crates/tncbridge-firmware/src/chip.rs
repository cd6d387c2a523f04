//! Hardware seams: the radio chip behind SPI and the GPIO port carrying its
//! interrupt lines.

use heapless::Vec;
use tncbridge_radio::{RadioParms, NUM_STATUS_REGS};

use crate::streamer::Event;

/// TX FIFO level at or above which the threshold line is asserted in TX mode.
pub const TX_THRESHOLD: usize = 33;
/// RX FIFO level at or above which the threshold line is asserted in RX mode.
pub const RX_THRESHOLD: usize = 32;

/// Command strobes used by the streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strobe {
    Idle,
    Tx,
    Rx,
    FlushTx,
    FlushRx,
}

/// What the threshold line reports (IOCFG2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Asserted while the RX FIFO is at or above [`RX_THRESHOLD`].
    Rx,
    /// Asserted while the TX FIFO is at or above [`TX_THRESHOLD`].
    Tx,
}

/// Register access to a CC1101-compatible transceiver.
pub trait RadioChip {
    /// Load the packed parameter record into the configuration registers.
    fn configure(&mut self, parms: &RadioParms);

    fn strobe(&mut self, strobe: Strobe);

    fn set_packet_length(&mut self, len: u8);

    fn set_threshold_mode(&mut self, mode: ThresholdMode);

    /// Burst write into the TX FIFO.
    fn write_tx_fifo(&mut self, data: &[u8]);

    /// Burst read from the RX FIFO into all of `buf`.
    fn read_rx_fifo(&mut self, buf: &mut [u8]);

    /// TXBYTES: underflow flag in bit 7, FIFO count in bits 0-6.
    fn tx_bytes(&mut self) -> u8;

    /// RXBYTES: overflow flag in bit 7, FIFO count in bits 0-6.
    fn rx_bytes(&mut self) -> u8;

    /// MARCSTATE, low 5 bits.
    fn marc_state(&mut self) -> u8;

    /// Status registers from PARTNUM upwards.
    fn read_status(&mut self, regs: &mut [u8; NUM_STATUS_REGS]);
}

/// The two chip outputs wired to port interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// GDO0: sync word sent or received until end of packet.
    Packet,
    /// GDO2: FIFO threshold.
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Interrupt control for the GPIO port carrying both lines.
pub trait InterruptLines {
    /// Select the edge, clear the line's pending flag and enable it.
    fn arm(&mut self, line: Line, edge: Edge);

    fn disarm(&mut self, line: Line);

    /// Clear pending flags of both lines.
    fn clear_pending(&mut self);

    /// Port input, interrupt flag, interrupt enable and edge-select registers.
    fn snapshot(&mut self) -> [u8; 4];
}

/// Bit masks of the two lines within their port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePins {
    pub packet: u8,
    pub threshold: u8,
}

impl LinePins {
    pub const fn mask(&self, line: Line) -> u8 {
        match line {
            Line::Packet => self.packet,
            Line::Threshold => self.threshold,
        }
    }
}

/// GDO0 on P2.5 and GDO2 on P2.4.
pub const PORT2_PINS: LinePins = LinePins {
    packet: 0x20,
    threshold: 0x10,
};

/// Decode the port flag and edge-select registers into events.
///
/// A set edge-select bit means the flag was raised by a falling edge. The
/// threshold line is reported first so that FIFO service precedes the end of
/// packet when both fire together.
pub fn events_from_port(flags: u8, edge_select: u8, pins: &LinePins) -> Vec<Event, 2> {
    let mut events = Vec::new();
    for line in [Line::Threshold, Line::Packet] {
        let mask = pins.mask(line);
        if flags & mask == 0 {
            continue;
        }
        let edge = if edge_select & mask != 0 {
            Edge::Falling
        } else {
            Edge::Rising
        };
        // Two lines, two slots.
        let _ = events.push(Event::new(line, edge));
    }
    events
}
