use crate::error::{RadioError, Result};

/// Bytes in the status register snapshot returned for RADIO_STATUS.
pub const NUM_STATUS_REGS: usize = 14;

const MARC_STATES: [&str; 23] = [
    "SLEEP",
    "IDLE",
    "XOFF",
    "VCOON_MC",
    "REGON_MC",
    "MANCAL",
    "VCOON",
    "REGON",
    "STARTCAL",
    "BWBOOST",
    "FS_LOCK",
    "IFADCON",
    "ENDCAL",
    "RX",
    "RX_END",
    "RX_RST",
    "TXRX_SWITCH",
    "RXFIFO_OVERFLOW",
    "FSTXON",
    "TX",
    "TX_END",
    "RXTX_SWITCH",
    "TXFIFO_UNDERFLOW",
];

/// MARCSTATE value of the idle state.
pub const MARC_IDLE: u8 = 1;
/// MARCSTATE value while receiving.
pub const MARC_RX: u8 = 13;
/// MARCSTATE value while transmitting.
pub const MARC_TX: u8 = 19;

/// Name of a MARCSTATE value (low 5 bits).
pub fn marc_state_name(state: u8) -> &'static str {
    MARC_STATES
        .get(usize::from(state & 0x1F))
        .copied()
        .unwrap_or("undefined")
}

/// RSSI register (two's complement, half-dB steps) to dBm.
pub fn rssi_dbm(raw: u8) -> f32 {
    f32::from(raw as i8) / 2.0 - 74.0
}

/// Split the appended status byte into (CRC OK, LQI).
pub fn crc_lqi(raw: u8) -> (bool, u8) {
    (raw & 0x80 != 0, raw & 0x7F)
}

/// Decoded status register snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct RadioStatus {
    pub part_number: u8,
    pub version: u8,
    pub freq_offset_estimate: i8,
    pub crc_ok: bool,
    pub lqi: u8,
    pub rssi_dbm: f32,
    pub marc_state: u8,
    pub wor_time: u16,
    pub carrier_sense: bool,
    pub preamble_quality_reached: bool,
    pub clear_channel: bool,
    pub start_of_frame: bool,
    pub gdo2: bool,
    pub gdo0: bool,
    pub vco_vc_dac: u8,
    pub tx_underflow: bool,
    pub tx_bytes: u8,
    pub rx_overflow: bool,
    pub rx_bytes: u8,
}

impl RadioStatus {
    /// Decode a register snapshot. Only the first 12 bytes carry fields; the
    /// remainder is padding reserved by the firmware.
    pub fn decode(regs: &[u8]) -> Result<Self> {
        if regs.len() < 12 {
            return Err(RadioError::Truncated {
                record: "radio status",
                len: regs.len(),
                expected: 12,
            });
        }
        let (crc_ok, lqi) = crc_lqi(regs[3]);
        let pktstatus = regs[8];
        Ok(Self {
            part_number: regs[0],
            version: regs[1],
            freq_offset_estimate: regs[2] as i8,
            crc_ok,
            lqi,
            rssi_dbm: rssi_dbm(regs[4]),
            marc_state: regs[5] & 0x1F,
            wor_time: u16::from_be_bytes([regs[6], regs[7]]),
            carrier_sense: pktstatus & 0x40 != 0,
            preamble_quality_reached: pktstatus & 0x20 != 0,
            clear_channel: pktstatus & 0x10 != 0,
            start_of_frame: pktstatus & 0x08 != 0,
            gdo2: pktstatus & 0x04 != 0,
            gdo0: pktstatus & 0x01 != 0,
            vco_vc_dac: regs[9],
            tx_underflow: regs[10] & 0x80 != 0,
            tx_bytes: regs[10] & 0x7F,
            rx_overflow: regs[11] & 0x80 != 0,
            rx_bytes: regs[11] & 0x7F,
        })
    }

    pub fn marc_state_name(&self) -> &'static str {
        marc_state_name(self.marc_state)
    }
}
