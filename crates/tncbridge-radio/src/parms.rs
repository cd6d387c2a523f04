use crate::consts::{Modulation, PacketLengthMode};
use crate::error::{RadioError, Result};

/// Size of the packed record on the wire. Sent as the INIT block's size byte.
pub const PARMS_WIRE_SIZE: usize = 19;

/// Packed radio configuration consumed by the firmware.
///
/// Field order is the wire order. All single-byte fields come first, the
/// 24-bit frequency word is carried as a little-endian `u32` at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadioParms {
    pub packet_length: u8,
    /// LENGTH_CONFIG[1:0]
    pub packet_config: u8,
    /// NUM_PREAMBLE[2:0]
    pub preamble_word: u8,
    /// SYNC_MODE[2:0]
    pub sync_word: u8,
    /// DRATE_E[3:0]
    pub drate_e: u8,
    pub drate_m: u8,
    /// DEVIATION_E[2:0]
    pub deviat_e: u8,
    /// DEVIATION_M[2:0]
    pub deviat_m: u8,
    /// CHANBW_E[1:0]
    pub chanbw_e: u8,
    /// CHANBW_M[1:0]
    pub chanbw_m: u8,
    /// CHANSPC_E[1:0]
    pub chanspc_e: u8,
    pub chanspc_m: u8,
    /// FREQ_IF[4:0]
    pub if_word: u8,
    /// MOD_FORMAT[2:0]
    pub mod_word: u8,
    /// Bit 0 FEC, bit 1 data whitening.
    pub fec_whitening: u8,
    /// FREQ[23:0]
    pub freq_word: u32,
}

impl RadioParms {
    /// Mask every field to its declared width.
    pub fn masked(mut self) -> Self {
        self.packet_config &= 0x03;
        self.preamble_word &= 0x07;
        self.sync_word &= 0x07;
        self.drate_e &= 0x0F;
        self.deviat_e &= 0x07;
        self.deviat_m &= 0x07;
        self.chanbw_e &= 0x03;
        self.chanbw_m &= 0x03;
        self.chanspc_e &= 0x03;
        self.if_word &= 0x1F;
        self.mod_word &= 0x07;
        self.fec_whitening &= 0x03;
        self.freq_word &= 0x00FF_FFFF;
        self
    }

    /// Serialize to the fixed wire layout. Fields are masked on the way out.
    pub fn to_bytes(&self) -> [u8; PARMS_WIRE_SIZE] {
        let p = self.masked();
        let mut out = [0u8; PARMS_WIRE_SIZE];
        out[..15].copy_from_slice(&[
            p.packet_length,
            p.packet_config,
            p.preamble_word,
            p.sync_word,
            p.drate_e,
            p.drate_m,
            p.deviat_e,
            p.deviat_m,
            p.chanbw_e,
            p.chanbw_m,
            p.chanspc_e,
            p.chanspc_m,
            p.if_word,
            p.mod_word,
            p.fec_whitening,
        ]);
        out[15..].copy_from_slice(&p.freq_word.to_le_bytes());
        out
    }

    /// Parse the fixed wire layout. Extra trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PARMS_WIRE_SIZE {
            return Err(RadioError::Truncated {
                record: "radio parameter",
                len: bytes.len(),
                expected: PARMS_WIRE_SIZE,
            });
        }
        let freq = [bytes[15], bytes[16], bytes[17], bytes[18]];
        Ok(RadioParms {
            packet_length: bytes[0],
            packet_config: bytes[1],
            preamble_word: bytes[2],
            sync_word: bytes[3],
            drate_e: bytes[4],
            drate_m: bytes[5],
            deviat_e: bytes[6],
            deviat_m: bytes[7],
            chanbw_e: bytes[8],
            chanbw_m: bytes[9],
            chanspc_e: bytes[10],
            chanspc_m: bytes[11],
            if_word: bytes[12],
            mod_word: bytes[13],
            fec_whitening: bytes[14],
            freq_word: u32::from_le_bytes(freq),
        }
        .masked())
    }

    pub fn fec(&self) -> bool {
        self.fec_whitening & 0x01 != 0
    }

    pub fn whitening(&self) -> bool {
        self.fec_whitening & 0x02 != 0
    }

    pub fn modulation(&self) -> Option<Modulation> {
        Modulation::from_word(self.mod_word)
    }

    pub fn length_mode(&self) -> Option<PacketLengthMode> {
        PacketLengthMode::from_bits(self.packet_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout_is_fixed() {
        let parms = RadioParms {
            packet_length: 250,
            drate_m: 131,
            freq_word: 0x10AD4B,
            ..Default::default()
        };
        let bytes = parms.to_bytes();
        assert_eq!(bytes.len(), PARMS_WIRE_SIZE);
        assert_eq!(bytes[0], 250);
        assert_eq!(bytes[5], 131);
        assert_eq!(&bytes[15..], &[0x4B, 0xAD, 0x10, 0x00]);
        assert_eq!(RadioParms::from_bytes(&bytes).unwrap(), parms);
    }

    #[test]
    fn fields_are_masked_before_packing() {
        let parms = RadioParms {
            packet_config: 0xFF,
            drate_e: 0x1F,
            chanbw_m: 0x07,
            if_word: 0xFF,
            freq_word: 0xFF12_3456,
            ..Default::default()
        };
        let bytes = parms.to_bytes();
        assert_eq!(bytes[1], 0x03);
        assert_eq!(bytes[4], 0x0F);
        assert_eq!(bytes[9], 0x03);
        assert_eq!(bytes[12], 0x1F);
        assert_eq!(&bytes[15..], &[0x56, 0x34, 0x12, 0x00]);
    }

    #[test]
    fn short_record_is_rejected() {
        let err = RadioParms::from_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            RadioError::Truncated {
                record: "radio parameter",
                len: 10,
                expected: PARMS_WIRE_SIZE,
            }
        );
    }

    #[test]
    fn flag_accessors() {
        let parms = RadioParms {
            fec_whitening: 0x03,
            mod_word: 4,
            packet_config: 1,
            ..Default::default()
        };
        assert!(parms.fec());
        assert!(parms.whitening());
        assert_eq!(parms.modulation(), Some(Modulation::Fsk4));
        assert_eq!(parms.length_mode(), Some(PacketLengthMode::Variable));
    }
}
