//! Radio parameter compiler.
//!
//! Register formulas (26 MHz crystal):
//! - `FREQ  = f · 2^16 / Fxosc`
//! - `DRATE = (Fxosc / 2^28) · (256 + DRATE_M) · 2^DRATE_E`
//! - `DEVIATION = (Fxosc / 2^17) · (8 + DEVIATION_M) · 2^DEVIATION_E`
//! - `CHANBW = Fxosc / (8 · (4 + CHANBW_M) · 2^CHANBW_E)`

use libm::{floor, ldexp, log2, round};

use crate::consts::{
    DataRate, Modulation, PacketLengthMode, Preamble, SyncMode, CHANBW_LIMITS, FSK4_MAX_RATE,
    XTAL_HZ,
};
use crate::parms::RadioParms;

/// User-level description of the radio channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioIntent {
    /// Target carrier frequency in Hz.
    pub freq_hz: u32,
    /// Crystal correction in parts per billion, applied to `freq_hz`.
    pub freq_offset_ppb: i32,
    /// Intermediate frequency in Hz.
    pub if_hz: u32,
    pub rate: DataRate,
    /// Multiplier applied to the nominal rate.
    pub rate_skew: f64,
    pub modulation: Modulation,
    /// Deviation as a fraction of the data rate.
    pub modulation_index: f64,
    pub fec: bool,
    pub whitening: bool,
    /// Radio block size in bytes.
    pub packet_length: u8,
    pub variable_length: bool,
    pub preamble: Preamble,
}

impl Default for RadioIntent {
    fn default() -> Self {
        Self {
            freq_hz: 433_600_000,
            freq_offset_ppb: 0,
            if_hz: 310_000,
            rate: DataRate::default(),
            rate_skew: 1.0,
            modulation: Modulation::default(),
            modulation_index: 0.5,
            fec: false,
            whitening: false,
            packet_length: 250,
            variable_length: false,
            preamble: Preamble::default(),
        }
    }
}

impl RadioIntent {
    /// Data rate after skew and the 4-level ceiling.
    pub fn effective_rate(&self) -> f64 {
        let rate = f64::from(self.rate.baud()) * self.rate_skew;
        if self.modulation == Modulation::Fsk4 && rate > FSK4_MAX_RATE {
            FSK4_MAX_RATE
        } else {
            rate
        }
    }

    /// Target frequency with the ppb correction applied.
    pub fn corrected_freq_hz(&self) -> f64 {
        let freq = f64::from(self.freq_hz);
        freq + freq * f64::from(self.freq_offset_ppb) * 1e-9
    }
}

/// Compile `intent` into the packed register record.
pub fn compile(intent: &RadioIntent) -> RadioParms {
    let nominal = f64::from(intent.rate.baud()) * intent.rate_skew;
    let rate = intent.effective_rate();
    if rate < nominal {
        #[cfg(feature = "std")]
        tracing::warn!(
            requested = nominal,
            applied = rate,
            "data rate forced to 300 kBaud for 4-FSK"
        );
    }

    let deviation = rate * intent.modulation_index;
    let (chanbw_e, chanbw_m) = chanbw_words(2.0 * (deviation + rate));
    let (drate_e, drate_m) = drate_words(rate);
    let (deviat_e, deviat_m) = deviation_words(deviation);

    let length_mode = if intent.variable_length {
        PacketLengthMode::Variable
    } else {
        PacketLengthMode::Fixed
    };

    RadioParms {
        packet_length: intent.packet_length,
        packet_config: length_mode as u8,
        preamble_word: intent.preamble.class(),
        sync_word: SyncMode::Bits30Of32 as u8,
        drate_e,
        drate_m,
        deviat_e,
        deviat_m,
        chanbw_e,
        chanbw_m,
        chanspc_e: 0,
        chanspc_m: 0,
        if_word: if_word(intent.if_hz),
        mod_word: intent.modulation.word(),
        fec_whitening: u8::from(intent.fec) | (u8::from(intent.whitening) << 1),
        freq_word: freq_word(intent.corrected_freq_hz()),
    }
    .masked()
}

/// `round(f · 2^16 / Fxosc)` truncated to 24 bits.
pub fn freq_word(freq_hz: f64) -> u32 {
    let word = round(ldexp(freq_hz, 16) / XTAL_HZ);
    if word <= 0.0 {
        return 0;
    }
    (word as u64 & 0x00FF_FFFF) as u32
}

/// `((if · 2^10) / Fxosc) mod 32`
pub fn if_word(if_hz: u32) -> u8 {
    let word = (u64::from(if_hz) << 10) / XTAL_HZ as u64;
    (word % 32) as u8
}

/// First table step the bandwidth exceeds, else the narrowest step.
pub fn chanbw_words(bandwidth: f64) -> (u8, u8) {
    CHANBW_LIMITS
        .iter()
        .position(|&limit| bandwidth > limit)
        .map(|index| ((index / 4) as u8, (index % 4) as u8))
        .unwrap_or((3, 3))
}

/// 4-bit exponent, 8-bit mantissa.
pub fn drate_words(rate: f64) -> (u8, u8) {
    exponent_mantissa(rate, 20, 28, 256.0, 15, 255)
}

/// 3-bit exponent, 3-bit mantissa.
pub fn deviation_words(deviation: f64) -> (u8, u8) {
    exponent_mantissa(deviation, 14, 17, 8.0, 7, 7)
}

// e = floor(log2(v · 2^e_shift / Fxosc)),
// m = round(v · 2^m_shift / (Fxosc · 2^e)) - base.
// A mantissa that rounds up to `base` moves to the next exponent.
fn exponent_mantissa(
    value: f64,
    e_shift: i32,
    m_shift: i32,
    base: f64,
    e_max: i32,
    m_max: i32,
) -> (u8, u8) {
    if value <= 0.0 {
        return (0, 0);
    }
    let mut e = floor(log2(ldexp(value, e_shift) / XTAL_HZ)) as i32;
    e = e.clamp(0, e_max);
    let mut m = round(ldexp(value, m_shift - e) / XTAL_HZ) as i32 - base as i32;
    if m > m_max && e < e_max {
        e += 1;
        m = round(ldexp(value, m_shift - e) / XTAL_HZ) as i32 - base as i32;
    }
    (e as u8, m.clamp(0, m_max) as u8)
}
