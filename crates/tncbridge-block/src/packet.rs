//! Packet segmentation over radio blocks.
//!
//! A radio block of `block_size` bytes carries one segment:
//!
//! ```text
//! ┌──────────────┬───────────────┬─────────────────────────────────┐
//! │ used_len (1) │ countdown (1) │ data, zero padded (block_size-2) │
//! └──────────────┴───────────────┴─────────────────────────────────┘
//! ```
//!
//! `used_len` is the data length plus one (the countdown byte). Countdowns
//! run from `block_count - 1` down to 0; 0 marks the last segment.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tncbridge_transport::{Clock, Duplex};
use tracing::{debug, trace, warn};

use crate::command::{BlockType, MIN_RECEIVED_LEN, TX_ACK_LEN};
use crate::error::{BlockError, Result};
use crate::link::BlockLink;

/// Segments needed for `len` bytes: `ceil(len / (block_size - 2))`.
pub fn block_count(len: usize, block_size: u8) -> Result<usize> {
    let capacity = segment_capacity(block_size)?;
    Ok(len.div_ceil(capacity))
}

fn segment_capacity(block_size: u8) -> Result<usize> {
    if block_size < 3 {
        return Err(BlockError::InvalidBlockSize(block_size));
    }
    Ok(usize::from(block_size) - 2)
}

/// Split `payload` into radio blocks of exactly `block_size` bytes.
///
/// An empty payload yields no blocks.
pub fn segment(payload: &[u8], block_size: u8) -> Result<Vec<Bytes>> {
    let capacity = segment_capacity(block_size)?;
    let count = payload.len().div_ceil(capacity);
    if count > 256 {
        return Err(BlockError::PacketTooLarge {
            len: payload.len(),
            blocks: count,
        });
    }

    Ok(payload
        .chunks(capacity)
        .enumerate()
        .map(|(index, data)| {
            let mut block = BytesMut::with_capacity(usize::from(block_size));
            block.put_u8(data.len() as u8 + 1);
            block.put_u8((count - 1 - index) as u8);
            block.put_slice(data);
            block.resize(usize::from(block_size), 0);
            block.freeze()
        })
        .collect())
}

/// Status block returned for TX, TX_KO and RX_KO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadioAck {
    /// Radio state byte reported by the firmware.
    pub status: u8,
    pub packet_rising: u8,
    pub packet_falling: u8,
    pub threshold_rising: u8,
    pub threshold_falling: u8,
    /// Interrupt port input, flag, enable and edge-select registers.
    pub gpio: [u8; 4],
}

impl RadioAck {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < TX_ACK_LEN {
            return Err(BlockError::NotReceived {
                len: payload.len() + 2,
            });
        }
        Ok(Self {
            status: payload[0],
            packet_rising: payload[1],
            packet_falling: payload[2],
            threshold_rising: payload[3],
            threshold_falling: payload[4],
            gpio: [payload[5], payload[6], payload[7], payload[8]],
        })
    }
}

/// One segment as answered to an RX command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedBlock {
    pub countdown: u8,
    pub data: Bytes,
    /// Raw RSSI register value.
    pub rssi: u8,
    /// CRC-OK flag in bit 7, LQI in bits 0-6.
    pub crc_lqi: u8,
}

impl ReceivedBlock {
    /// Parse an RX answer payload `[used_len, countdown, data…, rssi, crc_lqi]`.
    pub fn parse(payload: &Bytes) -> Result<Self> {
        let observed = payload.len() + 2;
        if observed < MIN_RECEIVED_LEN {
            return Err(BlockError::NotReceived { len: observed });
        }
        let used_len = usize::from(payload[0]);
        let countdown = payload[1];
        let (region_end, rssi, crc_lqi) = if payload.len() >= 4 {
            let n = payload.len();
            (n - 2, payload[n - 2], payload[n - 1])
        } else {
            (payload.len(), 0, 0)
        };
        let data_len = used_len.saturating_sub(1).min(region_end - 2);
        Ok(Self {
            countdown,
            data: payload.slice(2..2 + data_len),
            rssi,
            crc_lqi,
        })
    }

    pub fn crc_ok(&self) -> bool {
        self.crc_lqi & 0x80 != 0
    }

    pub fn lqi(&self) -> u8 {
        self.crc_lqi & 0x7F
    }
}

/// A reassembled packet and the link quality of its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub data: Bytes,
    pub blocks: usize,
    pub rssi: u8,
    pub crc_lqi: u8,
}

/// Puts segments back together by countdown.
///
/// The first segment fixes the expected count; every later countdown must be
/// exactly one below the previous. Any error resets the reassembler.
#[derive(Debug, Default)]
pub struct Reassembler {
    expected_count: usize,
    blocks_read: usize,
    data: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a packet is partly assembled.
    pub fn in_progress(&self) -> bool {
        self.blocks_read > 0
    }

    /// Add the next segment. Returns the packet once countdown 0 arrives.
    pub fn push(&mut self, block: ReceivedBlock) -> Result<Option<ReceivedPacket>> {
        if self.blocks_read == 0 {
            self.expected_count = usize::from(block.countdown) + 1;
        }
        self.blocks_read += 1;

        let expected = self.expected_count.saturating_sub(self.blocks_read);
        if usize::from(block.countdown) != expected {
            self.reset();
            return Err(BlockError::Sequence {
                expected: expected as u8,
                actual: block.countdown,
            });
        }
        if !block.crc_ok() {
            self.reset();
            return Err(BlockError::Crc {
                countdown: block.countdown,
            });
        }

        trace!(
            countdown = block.countdown,
            size = self.data.len() + block.data.len(),
            "segment accepted"
        );
        self.data.extend_from_slice(&block.data);

        if block.countdown > 0 {
            return Ok(None);
        }
        let packet = ReceivedPacket {
            data: self.data.split().freeze(),
            blocks: self.blocks_read,
            rssi: block.rssi,
            crc_lqi: block.crc_lqi,
        };
        self.reset();
        Ok(Some(packet))
    }

    pub fn reset(&mut self) {
        self.expected_count = 0;
        self.blocks_read = 0;
        self.data.clear();
    }
}

/// Send `payload` as a sequence of TX blocks, waiting for each ack.
///
/// Stops at the first missing or KO ack. Returns the number of blocks sent.
pub fn send_packet<S: Duplex, C: Clock + Clone>(
    link: &mut BlockLink<S, C>,
    payload: &[u8],
    block_size: u8,
    block_delay: Duration,
    ack_timeout: Duration,
) -> Result<usize> {
    let blocks = segment(payload, block_size)?;
    let total = blocks.len();
    for (index, block) in blocks.iter().enumerate() {
        if index > 0 && !block_delay.is_zero() {
            link.clock().sleep(block_delay);
        }
        let reply = link.request(BlockType::Tx, block, ack_timeout)?;
        match reply.kind() {
            Some(BlockType::Tx) => {
                let ack = RadioAck::parse(&reply.payload)?;
                trace!(countdown = block[1], ?ack, "block acknowledged");
            }
            Some(BlockType::TxKo) => {
                warn!(countdown = block[1], "block transmission failed");
                return Err(BlockError::Rejected {
                    command: BlockType::Tx.name(),
                    reply: BlockType::TxKo.name(),
                });
            }
            _ => {
                return Err(BlockError::UnexpectedType {
                    expected: BlockType::Tx.name(),
                    actual: reply.name(),
                })
            }
        }
    }
    debug!(size = payload.len(), blocks = total, "packet sent");
    Ok(total)
}

/// Interpret the answer to an RX command.
pub fn parse_rx_reply(reply: &crate::codec::Block) -> Result<ReceivedBlock> {
    match reply.kind() {
        Some(BlockType::Rx) => ReceivedBlock::parse(&reply.payload),
        Some(BlockType::RxKo) => Err(BlockError::Rejected {
            command: BlockType::Rx.name(),
            reply: BlockType::RxKo.name(),
        }),
        _ => Err(BlockError::UnexpectedType {
            expected: BlockType::Rx.name(),
            actual: reply.name(),
        }),
    }
}

/// Receive a whole packet, one segment at a time from `next_block`.
///
/// `next_block` gets the deadline for the segment it has to fetch:
/// `first_timeout` for the first one (`None` waits forever), then
/// `inter_block_timeout`. A sequence or CRC error discards the packet.
pub fn receive_packet<F>(
    first_timeout: Option<Duration>,
    inter_block_timeout: Duration,
    mut next_block: F,
) -> Result<ReceivedPacket>
where
    F: FnMut(Option<Duration>) -> Result<ReceivedBlock>,
{
    let mut reassembler = Reassembler::new();
    let mut timeout = first_timeout;
    loop {
        let block = next_block(timeout)?;
        if let Some(packet) = reassembler.push(block)? {
            debug!(
                size = packet.data.len(),
                blocks = packet.blocks,
                "packet received"
            );
            return Ok(packet);
        }
        timeout = Some(inter_block_timeout);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use tncbridge_transport::{pair, ManualClock, MemoryLink};

    use super::*;
    use crate::codec::BlockConfig;

    fn rx(countdown: u8, data: &[u8], crc_ok: bool) -> ReceivedBlock {
        ReceivedBlock {
            countdown,
            data: Bytes::copy_from_slice(data),
            rssi: 0x20,
            crc_lqi: if crc_ok { 0x85 } else { 0x05 },
        }
    }

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(block_count(0, 10).unwrap(), 0);
        assert_eq!(block_count(1, 10).unwrap(), 1);
        assert_eq!(block_count(8, 10).unwrap(), 1);
        assert_eq!(block_count(9, 10).unwrap(), 2);
        assert_eq!(block_count(600, 250).unwrap(), 3);
        assert!(matches!(
            block_count(5, 2),
            Err(BlockError::InvalidBlockSize(2))
        ));
    }

    #[test]
    fn segment_layout() {
        let blocks = segment(b"abcdefghij", 6).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].as_ref(), &[5, 2, b'a', b'b', b'c', b'd']);
        assert_eq!(blocks[1].as_ref(), &[5, 1, b'e', b'f', b'g', b'h']);
        assert_eq!(blocks[2].as_ref(), &[3, 0, b'i', b'j', 0, 0]);
        assert!(segment(b"", 6).unwrap().is_empty());
    }

    #[test]
    fn segment_rejects_oversized_packet() {
        let payload = vec![0u8; 257];
        assert!(matches!(
            segment(&payload, 3),
            Err(BlockError::PacketTooLarge { blocks: 257, .. })
        ));
    }

    #[test]
    fn segments_reassemble() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut reassembler = Reassembler::new();
        let mut result = None;
        for block in segment(&payload, 250).unwrap() {
            let parsed = ReceivedBlock::parse(&with_trailer(&block)).unwrap();
            result = reassembler.push(parsed).unwrap();
        }
        let packet = result.unwrap();
        assert_eq!(packet.data.as_ref(), payload.as_slice());
        assert_eq!(packet.blocks, 5);
    }

    fn with_trailer(block: &[u8]) -> Bytes {
        let mut v = block.to_vec();
        v.extend_from_slice(&[0x20, 0x81]);
        Bytes::from(v)
    }

    #[test]
    fn countdown_sequence_accepted() {
        let mut r = Reassembler::new();
        assert!(r.push(rx(3, b"a", true)).unwrap().is_none());
        assert!(r.push(rx(2, b"b", true)).unwrap().is_none());
        assert!(r.push(rx(1, b"c", true)).unwrap().is_none());
        let packet = r.push(rx(0, b"d", true)).unwrap().unwrap();
        assert_eq!(packet.data.as_ref(), b"abcd");
        assert!(!r.in_progress());
    }

    #[test]
    fn repeated_countdown_is_sequence_error() {
        let mut r = Reassembler::new();
        r.push(rx(3, b"a", true)).unwrap();
        r.push(rx(2, b"b", true)).unwrap();
        let err = r.push(rx(2, b"c", true)).unwrap_err();
        assert!(matches!(
            err,
            BlockError::Sequence {
                expected: 1,
                actual: 2
            }
        ));
        assert!(!r.in_progress());
    }

    #[test]
    fn skipped_countdown_is_sequence_error() {
        let mut r = Reassembler::new();
        r.push(rx(3, b"a", true)).unwrap();
        let err = r.push(rx(1, b"b", true)).unwrap_err();
        assert!(matches!(
            err,
            BlockError::Sequence {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn crc_failure_discards_packet() {
        let mut r = Reassembler::new();
        r.push(rx(1, b"a", true)).unwrap();
        let err = r.push(rx(0, b"b", false)).unwrap_err();
        assert!(matches!(err, BlockError::Crc { countdown: 0 }));
        let packet = r.push(rx(0, b"z", true)).unwrap().unwrap();
        assert_eq!(packet.data.as_ref(), b"z");
    }

    #[test]
    fn parse_rx_payload() {
        let payload = Bytes::from_static(&[4, 0, b'x', b'y', b'z', 0, 0, 0x14, 0x9F]);
        let block = ReceivedBlock::parse(&payload).unwrap();
        assert_eq!(block.countdown, 0);
        assert_eq!(block.data.as_ref(), b"xyz");
        assert_eq!(block.rssi, 0x14);
        assert!(block.crc_ok());
        assert_eq!(block.lqi(), 0x1F);
    }

    #[test]
    fn short_rx_payload_is_not_received() {
        let payload = Bytes::from_static(&[1]);
        assert!(matches!(
            ReceivedBlock::parse(&payload),
            Err(BlockError::NotReceived { len: 3 })
        ));
    }

    #[test]
    fn used_len_is_bounded_by_payload() {
        let payload = Bytes::from_static(&[200, 0, b'a', 0x10, 0x80]);
        let block = ReceivedBlock::parse(&payload).unwrap();
        assert_eq!(block.data.as_ref(), b"a");
    }

    #[test]
    fn ack_parse() {
        let ack = RadioAck::parse(&[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        assert_eq!(ack.status, 1);
        assert_eq!(ack.threshold_falling, 5);
        assert_eq!(ack.gpio, [6, 7, 8, 9]);
        assert!(RadioAck::parse(&[0; 4]).is_err());
    }

    fn link() -> (BlockLink<MemoryLink, ManualClock>, MemoryLink) {
        let (host, device) = pair();
        let link = BlockLink::connect(host, ManualClock::new(), BlockConfig::default()).unwrap();
        (link, device)
    }

    #[test]
    fn send_packet_stops_on_ko() {
        let (mut link, mut device) = link();
        // First ack OK, second KO.
        device.write_all(&[2, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        device.write_all(&[3, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let err = send_packet(
            &mut link,
            &[7u8; 20],
            6,
            Duration::ZERO,
            Duration::from_millis(5),
        )
        .unwrap_err();
        assert!(matches!(err, BlockError::Rejected { reply: "TX_KO", .. }));

        // Exactly two TX blocks went out.
        let sent = device.drain();
        assert_eq!(sent.len(), 2 * (6 + 2));
        assert_eq!(&sent[..4], &[2, 6, 5, 4]);
    }

    #[test]
    fn send_packet_aborts_on_missing_ack() {
        let (mut link, device) = link();
        let err = send_packet(
            &mut link,
            b"hello",
            10,
            Duration::from_millis(10),
            Duration::from_millis(5),
        )
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(device.pending(), 12);
    }

    /// RX request and answer over `link`, the way the radio session does it.
    fn fetch(
        link: &mut BlockLink<MemoryLink, ManualClock>,
        timeout: Option<Duration>,
    ) -> Result<ReceivedBlock> {
        link.send_command(BlockType::Rx, &[4])?;
        let reply = link.read_block(timeout)?;
        parse_rx_reply(&reply)
    }

    #[test]
    fn receive_packet_over_link() {
        let (mut link, mut device) = link();
        device.write_all(&[4, 6, 3, 1, b'a', b'b', 0x10, 0x80]).unwrap();
        device.write_all(&[4, 5, 2, 0, b'c', 0x10, 0x8A]).unwrap();
        let packet = receive_packet(
            Some(Duration::from_millis(1)),
            Duration::from_millis(1),
            |timeout| fetch(&mut link, timeout),
        )
        .unwrap();
        assert_eq!(packet.data.as_ref(), b"abc");
        assert_eq!(packet.blocks, 2);
        assert_eq!(packet.crc_lqi & 0x7F, 0x0A);

        let mut sent = [0u8; 6];
        device.read_exact(&mut sent).unwrap();
        assert_eq!(sent, [4, 1, 4, 4, 1, 4]);
    }

    #[test]
    fn receive_packet_uses_inter_block_timeout() {
        let mut timeouts = Vec::new();
        let mut blocks = vec![rx(2, b"a", true), rx(1, b"b", true)].into_iter();
        let err = receive_packet(None, Duration::from_millis(7), |timeout| {
            timeouts.push(timeout);
            blocks
                .next()
                .ok_or(BlockError::Timeout(Duration::from_millis(7)))
        })
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(
            timeouts,
            vec![
                None,
                Some(Duration::from_millis(7)),
                Some(Duration::from_millis(7))
            ]
        );
    }

    #[test]
    fn receive_packet_discards_on_sequence_error() {
        let mut blocks = vec![rx(3, b"a", true), rx(1, b"b", true)].into_iter();
        let err = receive_packet(None, Duration::from_millis(1), |_| {
            Ok(blocks.next().unwrap())
        })
        .unwrap_err();
        assert!(matches!(err, BlockError::Sequence { expected: 2, actual: 1 }));
    }

    #[test]
    fn receive_packet_reports_rx_ko() {
        let (mut link, mut device) = link();
        device.write_all(&[5, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let err = receive_packet(None, Duration::from_millis(1), |timeout| {
            fetch(&mut link, timeout)
        })
        .unwrap_err();
        assert!(matches!(err, BlockError::Rejected { reply: "RX_KO", .. }));
    }
}
