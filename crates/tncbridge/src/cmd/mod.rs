use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tncbridge_block::BlockConfig;
use tncbridge_radio::{compile, DataRate, Modulation, Preamble, RadioIntent, RadioParms};
use tncbridge_tnc::{RadioLink, DEFAULT_LARGE_PACKET};
use tncbridge_transport::{MonotonicClock, SerialStream};

use crate::exit::{tnc_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod bulk;
pub mod echo;
pub mod init;
pub mod kiss;
pub mod params;
pub mod status;
pub mod version;

/// Line speed towards the microcontroller's USB CDC port.
const USB_BAUD: u32 = 115_200;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the KISS virtual TNC between a terminal device and the radio.
    Kiss(KissArgs),
    /// Print the radio chip status registers.
    Status(DeviceArgs),
    /// Load the radio parameters and print the realised channel.
    Init(DeviceArgs),
    /// Round-trip a phrase through the microcontroller.
    Echo(EchoArgs),
    /// Compile radio parameters without a device.
    Params(RadioArgs),
    /// Send a file (or stdin) as a series of packets.
    BulkTx(BulkTxArgs),
    /// Receive packets into a file (or stdout) until the link goes quiet.
    BulkRx(BulkRxArgs),
    /// Transmit a test phrase repeatedly.
    TxTest(TxTestArgs),
    /// Receive test packets and report link quality.
    RxTest(RxTestArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Kiss(args) => kiss::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Init(args) => init::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Params(args) => params::run(args, format),
        Command::BulkTx(args) => bulk::transmit(args, format),
        Command::BulkRx(args) => bulk::receive(args, format),
        Command::TxTest(args) => test::transmit(args, format),
        Command::RxTest(args) => test::receive(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ModulationArg {
    Ook,
    #[value(name = "2fsk")]
    Fsk2,
    #[value(name = "4fsk")]
    Fsk4,
    Msk,
    Gfsk,
}

impl From<ModulationArg> for Modulation {
    fn from(arg: ModulationArg) -> Self {
        match arg {
            ModulationArg::Ook => Modulation::Ook,
            ModulationArg::Fsk2 => Modulation::Fsk2,
            ModulationArg::Fsk4 => Modulation::Fsk4,
            ModulationArg::Msk => Modulation::Msk,
            ModulationArg::Gfsk => Modulation::Gfsk,
        }
    }
}

/// Radio channel settings shared by every command that talks to the chip.
#[derive(Args, Debug, Clone)]
pub struct RadioArgs {
    /// Carrier frequency in Hz.
    #[arg(long, short = 'f', default_value_t = 433_600_000)]
    pub frequency: u32,
    /// Crystal correction in parts per billion.
    #[arg(long, short = 'o', default_value_t = 0, allow_negative_numbers = true)]
    pub offset_ppb: i32,
    /// Intermediate frequency in Hz.
    #[arg(long, short = 'I', default_value_t = 310_000)]
    pub if_frequency: u32,
    /// Data rate in Bd (50, 110, 300 ... 250000, 500000).
    #[arg(long, short = 'R', default_value = "9600", value_parser = parse_rate)]
    pub rate: DataRate,
    /// Multiplier applied to the data rate.
    #[arg(long, short = 'w', default_value_t = 1.0)]
    pub rate_skew: f64,
    #[arg(long, short = 'M', value_enum, default_value = "2fsk")]
    pub modulation: ModulationArg,
    /// Deviation as a fraction of the data rate.
    #[arg(long, short = 'm', default_value_t = 0.5)]
    pub modulation_index: f64,
    /// Enable forward error correction.
    #[arg(long, short = 'F')]
    pub fec: bool,
    /// Enable data whitening.
    #[arg(long, short = 'W')]
    pub whitening: bool,
    /// Radio block size in bytes.
    #[arg(long, short = 'p', default_value_t = 250, value_parser = clap::value_parser!(u8).range(3..))]
    pub packet_length: u8,
    /// Variable packet length; the block size becomes a maximum.
    #[arg(long, short = 'V')]
    pub variable_length: bool,
    /// Preamble length in bytes (2, 3, 4, 6, 8, 12, 16, 24).
    #[arg(long, default_value = "4", value_parser = parse_preamble)]
    pub preamble: Preamble,
    /// Pause between the radio blocks of one packet (e.g. 10ms).
    #[arg(long, short = 'l', default_value = "10ms", value_parser = parse_duration)]
    pub block_delay: Duration,
}

impl RadioArgs {
    pub fn intent(&self) -> RadioIntent {
        RadioIntent {
            freq_hz: self.frequency,
            freq_offset_ppb: self.offset_ppb,
            if_hz: self.if_frequency,
            rate: self.rate,
            rate_skew: self.rate_skew,
            modulation: self.modulation.into(),
            modulation_index: self.modulation_index,
            fec: self.fec,
            whitening: self.whitening,
            packet_length: self.packet_length,
            variable_length: self.variable_length,
            preamble: self.preamble,
        }
    }

    pub fn parms(&self) -> RadioParms {
        compile(&self.intent())
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// USB serial device of the radio microcontroller.
    #[arg(long, short = 'U', default_value = "/dev/ttyACM2")]
    pub usb_device: String,
    #[command(flatten)]
    pub radio: RadioArgs,
}

#[derive(Args, Debug)]
pub struct KissArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Terminal side serial device or pseudo terminal.
    #[arg(long, short = 'D', default_value = "/var/ax25/axp2")]
    pub terminal: String,
    /// Terminal line speed in Bd.
    #[arg(long, short = 'B', default_value_t = 38_400)]
    pub terminal_speed: u32,
    /// Time to gather terminal frames before transmitting. 0 sends at once.
    #[arg(long, default_value = "40ms", value_parser = parse_duration)]
    pub serial_window: Duration,
    /// Time to gather radio packets before forwarding. 0 forwards at once.
    #[arg(long, default_value = "0", value_parser = parse_duration)]
    pub radio_window: Duration,
    /// Initial keyup delay. KISS TXDELAY overrides it.
    #[arg(long, default_value = "4ms", value_parser = parse_duration)]
    pub keyup_delay: Duration,
    /// Forward terminal bytes verbatim (SLIP mode).
    #[arg(long)]
    pub slip: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Phrase to send.
    #[arg(long, short = 'y', default_value = "Hello, World!")]
    pub phrase: String,
    /// Number of round trips.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub repetitions: u32,
}

#[derive(Args, Debug)]
pub struct BulkTxArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// File to send, `-` for stdin.
    #[arg(default_value = "-")]
    pub file: PathBuf,
    /// Bytes per packet.
    #[arg(long, short = 'P', default_value_t = DEFAULT_LARGE_PACKET)]
    pub large_packet_length: usize,
}

#[derive(Args, Debug)]
pub struct BulkRxArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// File to write, `-` for stdout.
    #[arg(default_value = "-")]
    pub file: PathBuf,
    /// Wait for the first packet (e.g. 4s).
    #[arg(long, default_value = "4s", value_parser = parse_duration)]
    pub first_timeout: Duration,
    /// Silence that ends the transfer (e.g. 500ms).
    #[arg(long, default_value = "500ms", value_parser = parse_duration)]
    pub inter_packet_timeout: Duration,
}

#[derive(Args, Debug)]
pub struct TxTestArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[arg(long, short = 'y', default_value = "Hello, World!")]
    pub phrase: String,
    #[arg(long, short = 'n', default_value_t = 1)]
    pub repetitions: u32,
    /// Packet size; the phrase is truncated or zero padded to it.
    #[arg(long, short = 'P', default_value_t = DEFAULT_LARGE_PACKET)]
    pub large_packet_length: usize,
}

#[derive(Args, Debug)]
pub struct RxTestArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Packets to wait for.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub repetitions: u32,
    /// Give up on a packet after this long. Waits forever when omitted.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub type Radio = RadioLink<SerialStream, MonotonicClock>;

/// Open the USB device and wrap it in a radio session.
pub fn open_radio(args: &DeviceArgs) -> CliResult<Radio> {
    let stream = SerialStream::open(&args.usb_device, USB_BAUD)
        .map_err(|err| transport_error("open USB device", err))?;
    let config = BlockConfig {
        block_delay: args.radio.block_delay,
        ..BlockConfig::default()
    };
    RadioLink::open(stream, MonotonicClock::new(), args.radio.parms(), config)
        .map_err(|err| tnc_error("open radio link", err))
}

/// Open the radio and load its parameters.
pub fn open_initialised(args: &DeviceArgs) -> CliResult<Radio> {
    let mut radio = open_radio(args)?;
    radio
        .init()
        .map_err(|err| tnc_error("radio init", err))?;
    Ok(radio)
}

pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(stop)
}

/// Parse `1500us`, `40ms`, `4s` or a bare number of milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    let (number, unit) = if let Some(num) = input.strip_suffix("us") {
        (num, "us")
    } else if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "ms")
    };
    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {input}"))?;
    Ok(match unit {
        "us" => Duration::from_micros(value),
        "s" => Duration::from_secs(value),
        _ => Duration::from_millis(value),
    })
}

fn parse_rate(input: &str) -> Result<DataRate, String> {
    let baud: u32 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid data rate: {input}"))?;
    DataRate::from_baud(baud).ok_or_else(|| format!("unsupported data rate: {baud} Bd"))
}

fn parse_preamble(input: &str) -> Result<Preamble, String> {
    let bytes: u8 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid preamble length: {input}"))?;
    Preamble::from_bytes(bytes).ok_or_else(|| format!("unsupported preamble length: {bytes}"))
}

/// Reject a zero where the command needs at least one.
pub fn require_positive(name: &str, value: usize) -> CliResult<usize> {
    if value == 0 {
        return Err(CliError::new(USAGE, format!("{name} must be greater than zero")));
    }
    Ok(value)
}
