use tncbridge_radio::RadioStatus;

use crate::cmd::{open_radio, DeviceArgs};
use crate::exit::{tnc_error, CliResult, SUCCESS};
use crate::output::{print, OutputFormat, Render};

impl Render for RadioStatus {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("part_number", format!("0x{:02x}", self.part_number)),
            ("version", format!("0x{:02x}", self.version)),
            ("freq_offset_estimate", self.freq_offset_estimate.to_string()),
            ("crc_ok", self.crc_ok.to_string()),
            ("lqi", self.lqi.to_string()),
            ("rssi_dbm", format!("{:.1}", self.rssi_dbm)),
            ("marc_state", self.marc_state_name().to_string()),
            ("wor_time", self.wor_time.to_string()),
            ("carrier_sense", self.carrier_sense.to_string()),
            ("preamble_quality_reached", self.preamble_quality_reached.to_string()),
            ("clear_channel", self.clear_channel.to_string()),
            ("start_of_frame", self.start_of_frame.to_string()),
            ("gdo2", self.gdo2.to_string()),
            ("gdo0", self.gdo0.to_string()),
            ("vco_vc_dac", self.vco_vc_dac.to_string()),
            ("tx_underflow", self.tx_underflow.to_string()),
            ("tx_bytes", self.tx_bytes.to_string()),
            ("rx_overflow", self.rx_overflow.to_string()),
            ("rx_bytes", self.rx_bytes.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.marc_state_name().to_string()
    }
}

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut radio = open_radio(&args)?;
    let status = radio
        .status()
        .map_err(|err| tnc_error("radio status", err))?;
    print(&status, format);
    Ok(SUCCESS)
}
