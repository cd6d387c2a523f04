use libm::ldexp;

use crate::consts::{Modulation, XTAL_HZ};
use crate::parms::RadioParms;

/// Channel figures realised by a compiled [`RadioParms`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct ActualParameters {
    pub frequency_hz: f64,
    pub if_hz: f64,
    pub channel_spacing_hz: f64,
    pub channel_bandwidth_hz: f64,
    pub data_rate_baud: f64,
    pub deviation_hz: f64,
    pub modulation: Option<Modulation>,
    pub fec: bool,
    pub whitening: bool,
    pub packet_length: u8,
    /// Air time of one byte in microseconds.
    pub byte_time_us: u32,
    /// Air time of one radio block in microseconds, without inter-block delay.
    pub packet_time_us: u32,
}

impl ActualParameters {
    pub fn from_parms(parms: &RadioParms) -> Self {
        let parms = parms.masked();
        Self {
            frequency_hz: ldexp(XTAL_HZ, -16) * f64::from(parms.freq_word),
            if_hz: ldexp(XTAL_HZ, -10) * f64::from(parms.if_word),
            channel_spacing_hz: ldexp(XTAL_HZ, -18)
                * (256.0 + f64::from(parms.chanspc_m))
                * ldexp(1.0, i32::from(parms.chanspc_e)),
            channel_bandwidth_hz: XTAL_HZ
                / (8.0 * (4.0 + f64::from(parms.chanbw_m)) * ldexp(1.0, i32::from(parms.chanbw_e))),
            data_rate_baud: data_rate(&parms),
            deviation_hz: ldexp(XTAL_HZ, -17)
                * (8.0 + f64::from(parms.deviat_m))
                * ldexp(1.0, i32::from(parms.deviat_e)),
            modulation: parms.modulation(),
            fec: parms.fec(),
            whitening: parms.whitening(),
            packet_length: parms.packet_length,
            byte_time_us: byte_time_us(&parms),
            packet_time_us: (f64::from(parms.packet_length) * byte_time(&parms)) as u32,
        }
    }

    /// Time budget for one block exchange: `(packet_length + 2)` bytes on air
    /// plus the inter-block delay.
    pub fn block_time_us(&self, block_delay_us: u32) -> u32 {
        self.byte_time_us
            .saturating_mul(u32::from(self.packet_length) + 2)
            .saturating_add(block_delay_us)
    }
}

/// `(Fxosc / 2^28) · (256 + DRATE_M) · 2^DRATE_E`
pub fn data_rate(parms: &RadioParms) -> f64 {
    ldexp(XTAL_HZ, -28) * (256.0 + f64::from(parms.drate_m)) * ldexp(1.0, i32::from(parms.drate_e & 0x0F))
}

/// Microseconds per byte. Halved for 4-FSK, doubled with FEC.
pub fn byte_time_us(parms: &RadioParms) -> u32 {
    byte_time(parms) as u32
}

fn byte_time(parms: &RadioParms) -> f64 {
    let rate = data_rate(parms);
    if rate <= 0.0 {
        return 0.0;
    }
    let mut time = 8_000_000.0 / rate;
    if parms.modulation() == Some(Modulation::Fsk4) {
        time /= 2.0;
    }
    if parms.fec() {
        time *= 2.0;
    }
    time
}
