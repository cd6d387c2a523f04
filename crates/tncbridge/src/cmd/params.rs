use std::time::Duration;

use serde::Serialize;
use tncbridge_radio::{ActualParameters, RadioParms};
use tncbridge_tnc::LinkTiming;

use crate::cmd::RadioArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{hex, print, OutputFormat, Render};

#[derive(Serialize)]
pub struct ParamsOutput {
    #[serde(flatten)]
    actual: ActualParameters,
    /// Air time of one block plus the inter-block delay.
    block_time_us: u64,
    /// The INIT payload, as sent to the microcontroller.
    wire: String,
}

impl ParamsOutput {
    pub fn new(actual: ActualParameters, parms: &RadioParms, block_time: Duration) -> Self {
        Self {
            actual,
            block_time_us: u64::try_from(block_time.as_micros()).unwrap_or(u64::MAX),
            wire: hex(&parms.to_bytes()),
        }
    }
}

impl Render for ParamsOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let a = &self.actual;
        vec![
            ("frequency_mhz", format!("{:.6}", a.frequency_hz / 1e6)),
            ("if_khz", format!("{:.3}", a.if_hz / 1e3)),
            ("channel_spacing_khz", format!("{:.3}", a.channel_spacing_hz / 1e3)),
            ("channel_bandwidth_khz", format!("{:.3}", a.channel_bandwidth_hz / 1e3)),
            ("data_rate_baud", format!("{:.1}", a.data_rate_baud)),
            ("deviation_khz", format!("{:.3}", a.deviation_hz / 1e3)),
            (
                "modulation",
                a.modulation.map_or("unknown", |m| m.name()).to_string(),
            ),
            ("fec", a.fec.to_string()),
            ("whitening", a.whitening.to_string()),
            ("packet_length", a.packet_length.to_string()),
            ("byte_time_us", a.byte_time_us.to_string()),
            ("packet_time_us", a.packet_time_us.to_string()),
            ("block_time_us", self.block_time_us.to_string()),
            ("wire", self.wire.clone()),
        ]
    }

    fn raw(&self) -> String {
        self.wire.clone()
    }
}

pub fn run(args: RadioArgs, format: OutputFormat) -> CliResult<i32> {
    let parms = args.parms();
    let timing = LinkTiming::new(&parms, args.block_delay);
    let out = ParamsOutput::new(ActualParameters::from_parms(&parms), &parms, timing.block_time);
    print(&out, format);
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use tncbridge_radio::{compile, RadioIntent};

    use super::*;

    #[test]
    fn wire_is_the_init_payload() {
        let parms = compile(&RadioIntent::default());
        let out = ParamsOutput::new(
            ActualParameters::from_parms(&parms),
            &parms,
            Duration::from_millis(1),
        );
        assert_eq!(out.wire.split(' ').count(), tncbridge_radio::PARMS_WIRE_SIZE);
        assert_eq!(out.block_time_us, 1000);
        assert_eq!(out.raw(), out.wire);
    }

    #[test]
    fn fields_show_the_carrier_in_mhz() {
        let parms = compile(&RadioIntent::default());
        let out = ParamsOutput::new(ActualParameters::from_parms(&parms), &parms, Duration::ZERO);
        let fields = out.fields();
        let (_, freq) = fields
            .iter()
            .find(|(name, _)| *name == "frequency_mhz")
            .expect("frequency row");
        assert!(freq.starts_with("433.6"), "{freq}");
    }
}
