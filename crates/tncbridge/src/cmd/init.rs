use tncbridge_radio::ActualParameters;

use crate::cmd::params::ParamsOutput;
use crate::cmd::{open_initialised, DeviceArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print, OutputFormat};

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let radio = open_initialised(&args)?;
    let out = ParamsOutput::new(
        ActualParameters::from_parms(radio.parms()),
        radio.parms(),
        radio.timing().block_time,
    );
    print(&out, format);
    Ok(SUCCESS)
}
