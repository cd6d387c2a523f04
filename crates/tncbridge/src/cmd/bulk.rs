use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tncbridge_tnc::{bulk_receive, bulk_transmit, BulkReport};
use tracing::info;

use crate::cmd::{open_initialised, require_positive, BulkRxArgs, BulkTxArgs};
use crate::exit::{io_error, tnc_error, CliResult, SUCCESS};
use crate::output::{print, OutputFormat, Render};

impl Render for BulkReport {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("packets", self.packets.to_string()),
            ("bytes", self.bytes.to_string()),
            ("dropped", self.dropped.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.bytes.to_string()
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub fn transmit(args: BulkTxArgs, format: OutputFormat) -> CliResult<i32> {
    let chunk = require_positive("large packet length", args.large_packet_length)?;
    let input: Box<dyn Read> = if is_stdio(&args.file) {
        Box::new(std::io::stdin().lock())
    } else {
        let file = File::open(&args.file)
            .map_err(|err| io_error(&format!("open {}", args.file.display()), err))?;
        Box::new(BufReader::new(file))
    };

    let mut radio = open_initialised(&args.device)?;
    let report = bulk_transmit(&mut radio, input, chunk)
        .map_err(|err| tnc_error("bulk transmission", err))?;
    info!(file = %args.file.display(), "transmitted");
    print(&report, format);
    Ok(SUCCESS)
}

pub fn receive(args: BulkRxArgs, format: OutputFormat) -> CliResult<i32> {
    let to_stdout = is_stdio(&args.file);
    let output: Box<dyn Write> = if to_stdout {
        Box::new(std::io::stdout().lock())
    } else {
        let file = File::create(&args.file)
            .map_err(|err| io_error(&format!("create {}", args.file.display()), err))?;
        Box::new(BufWriter::new(file))
    };

    let mut radio = open_initialised(&args.device)?;
    let report = bulk_receive(
        &mut radio,
        output,
        args.first_timeout,
        args.inter_packet_timeout,
    )
    .map_err(|err| tnc_error("bulk reception", err))?;
    info!(
        file = %args.file.display(),
        packets = report.packets,
        bytes = report.bytes,
        "received"
    );
    // stdout carries the received data.
    if !to_stdout {
        print(&report, format);
    }
    Ok(SUCCESS)
}
