use std::time::Instant;

use serde::Serialize;

use crate::cmd::{open_radio, EchoArgs};
use crate::exit::{tnc_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_raw, print_rows, OutputFormat, Render};

#[derive(Serialize)]
struct EchoRound {
    index: u32,
    size: usize,
    round_trip_us: u64,
}

impl Render for EchoRound {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("index", self.index.to_string()),
            ("size", self.size.to_string()),
            ("round_trip_us", self.round_trip_us.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.round_trip_us.to_string()
    }
}

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    if args.phrase.len() > usize::from(u8::MAX) {
        return Err(CliError::new(
            DATA_INVALID,
            format!("phrase too long ({} bytes, max 255)", args.phrase.len()),
        ));
    }
    let mut radio = open_radio(&args.device)?;

    let mut rounds = Vec::new();
    let mut last = Vec::new();
    for index in 0..args.repetitions {
        let start = Instant::now();
        let echoed = radio
            .echo(args.phrase.as_bytes())
            .map_err(|err| tnc_error("echo", err))?;
        rounds.push(EchoRound {
            index,
            size: echoed.len(),
            round_trip_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
        });
        last = echoed.to_vec();
    }

    match format {
        OutputFormat::Raw => print_raw(&last),
        _ => print_rows(&rounds, format),
    }
    Ok(SUCCESS)
}
