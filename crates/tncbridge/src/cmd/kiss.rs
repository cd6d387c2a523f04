use serde::Serialize;
use tncbridge_tnc::{Tnc, TncConfig, TncStats};
use tncbridge_transport::SerialStream;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, open_radio, KissArgs};
use crate::exit::{tnc_error, transport_error, CliResult, SUCCESS};
use crate::output::{print, OutputFormat, Render};

#[derive(Serialize)]
struct KissOutput {
    terminal: String,
    #[serde(flatten)]
    stats: TncStats,
}

impl Render for KissOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("terminal", self.terminal.clone()),
            ("iterations", self.stats.iterations.to_string()),
            ("bytes_from_terminal", self.stats.bytes_from_terminal.to_string()),
            ("bytes_to_terminal", self.stats.bytes_to_terminal.to_string()),
            ("packets_to_radio", self.stats.packets_to_radio.to_string()),
            ("packets_from_radio", self.stats.packets_from_radio.to_string()),
            ("config_frames", self.stats.config_frames.to_string()),
            ("radio_errors", self.stats.radio_errors.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.stats.packets_to_radio.to_string()
    }
}

pub fn run(args: KissArgs, format: OutputFormat) -> CliResult<i32> {
    let radio = open_radio(&args.device)?;
    let terminal = SerialStream::open(&args.terminal, args.terminal_speed)
        .map_err(|err| transport_error("open terminal device", err))?;
    let config = TncConfig {
        serial_window: args.serial_window,
        radio_window: args.radio_window,
        keyup_delay: args.keyup_delay,
        slip: args.slip,
        ..TncConfig::default()
    };
    let stop = install_ctrlc_handler()?;

    info!(terminal = %args.terminal, slip = args.slip, "starting TNC");
    let mut tnc = Tnc::new(terminal, radio, config);
    let stats = tnc
        .run(&stop)
        .map_err(|err| tnc_error("TNC stopped", err))?;

    print(
        &KissOutput {
            terminal: args.terminal,
            stats,
        },
        format,
    );
    Ok(SUCCESS)
}
