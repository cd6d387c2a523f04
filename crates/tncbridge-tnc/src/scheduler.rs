//! The virtual TNC.
//!
//! Two byte streams meet here: the terminal (KISS or SLIP frames from an
//! AX.25 application) and the radio (packets from the microcontroller).
//! Each side accumulates into its own buffer. A buffer is flushed toward the
//! other side when the link turns around or when its concatenation window
//! has elapsed.
//!
//! One iteration of [`Tnc::step`]:
//! 1. poll the radio; received bytes go to the radio buffer
//! 2. poll the terminal; received bytes go to the terminal buffer
//! 3. flush the radio buffer to the terminal
//! 4. flush the terminal buffer to the radio (cancelling reception first)
//! 5. check the window of the side that was last active
//!
//! The radio is half duplex: reception is cancelled before every
//! transmission and re-armed after every flush.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use serde::Serialize;
use tncbridge_kiss::{interpret_command, tokenize, Disposition, KissParams, ParamOutcome, FEND};
use tncbridge_transport::{Clock, Duplex, PollRead};
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::radio::RadioLink;

/// Most bytes held from the terminal before a flush is forced.
const TERMINAL_BUFFER_CAPACITY: usize = 1 << 15;
const READ_CHUNK_SIZE: usize = 1024;

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TncConfig {
    /// How long terminal bytes are gathered before going on air.
    /// Zero sends every read at once.
    pub serial_window: Duration,
    /// How long radio packets are gathered before going to the terminal.
    /// Zero forwards every packet at once.
    pub radio_window: Duration,
    /// Initial keyup delay. KISS TXDELAY frames override it.
    pub keyup_delay: Duration,
    /// Forward terminal bytes verbatim, without looking for KISS commands.
    pub slip: bool,
    /// Sleep at the end of every iteration.
    pub idle_sleep: Duration,
}

impl Default for TncConfig {
    fn default() -> Self {
        Self {
            serial_window: Duration::from_millis(40),
            radio_window: Duration::ZERO,
            keyup_delay: Duration::from_millis(4),
            slip: false,
            idle_sleep: Duration::from_micros(10),
        }
    }
}

/// Which side last delivered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriState {
    Idle,
    RxActive,
    TxActive,
}

/// Counters reported when the TNC stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TncStats {
    pub iterations: u64,
    pub bytes_from_terminal: u64,
    pub bytes_to_terminal: u64,
    pub packets_to_radio: u64,
    pub packets_from_radio: u64,
    pub config_frames: u64,
    pub radio_errors: u64,
}

/// KISS virtual TNC between a terminal stream and a radio session.
pub struct Tnc<T, S, C> {
    terminal: T,
    radio: RadioLink<S, C>,
    clock: C,
    config: TncConfig,
    kiss: KissParams,
    state: TriState,
    rx_trigger: bool,
    tx_trigger: bool,
    force: bool,
    last_activity: Duration,
    radio_buf: BytesMut,
    terminal_buf: BytesMut,
    stats: TncStats,
}

impl<T, S, C> Tnc<T, S, C>
where
    T: Read + Write,
    S: Duplex,
    C: Clock + Clone,
{
    pub fn new(terminal: T, radio: RadioLink<S, C>, config: TncConfig) -> Self {
        let clock = radio.clock().clone();
        let kiss = KissParams {
            keyup_delay: config.keyup_delay,
            ..KissParams::default()
        };
        Self {
            terminal,
            radio,
            clock,
            config,
            kiss,
            state: TriState::Idle,
            rx_trigger: false,
            tx_trigger: false,
            force: false,
            last_activity: Duration::ZERO,
            radio_buf: BytesMut::new(),
            terminal_buf: BytesMut::new(),
            stats: TncStats::default(),
        }
    }

    pub fn state(&self) -> TriState {
        self.state
    }

    pub fn kiss_params(&self) -> &KissParams {
        &self.kiss
    }

    pub fn stats(&self) -> TncStats {
        self.stats
    }

    pub fn radio(&self) -> &RadioLink<S, C> {
        &self.radio
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Initialise the radio and arm reception.
    pub fn start(&mut self) -> Result<()> {
        self.radio.init()?;
        self.radio.arm_rx()?;
        info!(
            serial_window = ?self.config.serial_window,
            radio_window = ?self.config.radio_window,
            slip = self.config.slip,
            "TNC started"
        );
        Ok(())
    }

    /// Run until `stop` is set or an abort command arrives.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<TncStats> {
        self.start()?;
        while !stop.load(Ordering::SeqCst) {
            if self.step()? == ParamOutcome::Abort {
                info!("TNC stopped by KISS abort");
                break;
            }
            self.clock.sleep(self.config.idle_sleep);
        }
        if self.radio.is_rx_armed() {
            if let Err(err) = self.radio.cancel_rx() {
                warn!(error = %err, "could not cancel reception on shutdown");
            }
        }
        info!(stats = ?self.stats, "TNC stopped");
        Ok(self.stats)
    }

    /// One scheduler iteration.
    pub fn step(&mut self) -> Result<ParamOutcome> {
        self.stats.iterations += 1;
        self.poll_radio()?;
        self.poll_terminal()?;

        if !self.radio_buf.is_empty() && (self.rx_trigger || self.force) {
            self.flush_to_terminal()?;
        }
        if !self.terminal_buf.is_empty() && (self.tx_trigger || self.force) {
            if self.flush_to_radio()? == ParamOutcome::Abort {
                return Ok(ParamOutcome::Abort);
            }
        }

        if self.state != TriState::Idle && !self.force {
            let idle_for = self.clock.now().saturating_sub(self.last_activity);
            if idle_for > self.window() {
                trace!(state = ?self.state, "window elapsed");
                self.force = true;
            } else if self.state == TriState::RxActive {
                self.radio.arm_rx()?;
            }
        }
        Ok(ParamOutcome::Continue)
    }

    fn poll_radio(&mut self) -> Result<()> {
        match self.radio.poll_packet() {
            Ok(Some(packet)) => {
                self.stats.packets_from_radio += 1;
                self.radio_buf.extend_from_slice(&packet.data);
                self.mark_activity(self.config.radio_window);
                self.tx_trigger = self.state == TriState::TxActive;
                self.state = TriState::RxActive;
            }
            Ok(None) => {}
            Err(err) => {
                self.stats.radio_errors += 1;
                warn!(error = %err, "radio reception failed");
                self.radio.arm_rx()?;
                // Buffered bytes keep their window running.
                self.state = self.pending_state();
            }
        }
        Ok(())
    }

    fn poll_terminal(&mut self) -> Result<()> {
        let room = TERMINAL_BUFFER_CAPACITY.saturating_sub(self.terminal_buf.len());
        if room == 0 {
            self.force = true;
            return Ok(());
        }
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let limit = room.min(READ_CHUNK_SIZE);
        let n = self.terminal.poll_read(&mut chunk[..limit])?;
        if n == 0 {
            return Ok(());
        }
        self.stats.bytes_from_terminal += n as u64;
        self.terminal_buf.extend_from_slice(&chunk[..n]);
        self.mark_activity(self.config.serial_window);
        self.rx_trigger = self.state == TriState::RxActive;
        self.state = TriState::TxActive;
        Ok(())
    }

    fn mark_activity(&mut self, window: Duration) {
        self.last_activity = self.clock.now();
        self.force = window.is_zero();
    }

    /// Concatenation window of the side named by the current state.
    fn window(&self) -> Duration {
        match self.state {
            TriState::TxActive => self.config.serial_window,
            TriState::RxActive => self.config.radio_window,
            TriState::Idle => Duration::ZERO,
        }
    }

    /// The state matching what is still buffered. Terminal bytes win, they
    /// are the ones that need the link turned around.
    fn pending_state(&self) -> TriState {
        if !self.terminal_buf.is_empty() {
            TriState::TxActive
        } else if !self.radio_buf.is_empty() {
            TriState::RxActive
        } else {
            TriState::Idle
        }
    }

    fn flush_to_terminal(&mut self) -> Result<()> {
        let bytes = self.radio_buf.split();
        debug!(size = bytes.len(), "radio to terminal");
        self.terminal.write_all(&bytes)?;
        self.terminal.flush()?;
        self.stats.bytes_to_terminal += bytes.len() as u64;
        self.rx_trigger = false;
        self.settle()
    }

    fn flush_to_radio(&mut self) -> Result<ParamOutcome> {
        if let Err(err) = self.radio.cancel_rx() {
            warn!(error = %err, "cancel reception failed, re-initialising radio");
            self.radio.init()?;
        }

        let buffered = self.terminal_buf.split().freeze();
        let (payload, outcome) = if self.config.slip {
            (buffered.to_vec(), ParamOutcome::Continue)
        } else {
            self.strip_commands(&buffered)
        };
        if outcome == ParamOutcome::Abort {
            return Ok(ParamOutcome::Abort);
        }

        if !payload.is_empty() {
            if !self.kiss.keyup_delay.is_zero() {
                self.clock.sleep(self.kiss.keyup_delay);
            }
            debug!(size = payload.len(), "terminal to radio");
            match self.radio.send_packet(&payload) {
                Ok(_) => self.stats.packets_to_radio += 1,
                Err(err) => {
                    self.stats.radio_errors += 1;
                    warn!(error = %err, size = payload.len(), "packet transmission failed, dropped");
                }
            }
        }
        self.tx_trigger = false;
        self.settle()?;
        Ok(ParamOutcome::Continue)
    }

    /// Apply the configuration frames in `buffered` and return what is left
    /// to put on air, frames still escaped and delimited.
    fn strip_commands(&mut self, buffered: &[u8]) -> (Vec<u8>, ParamOutcome) {
        let tokens = tokenize(buffered);
        let mut payload = Vec::with_capacity(buffered.len());
        let mut outcome = ParamOutcome::Continue;
        for frame in tokens.frames {
            match interpret_command(frame) {
                Ok(Disposition::Config {
                    port,
                    command,
                    value,
                }) => {
                    self.stats.config_frames += 1;
                    debug!(port, ?command, value, "KISS command");
                    if self.kiss.apply(command, value) == ParamOutcome::Abort {
                        outcome = ParamOutcome::Abort;
                    }
                }
                Ok(Disposition::Data { .. }) | Err(_) => append_frame(&mut payload, frame),
            }
        }
        append_frame(&mut payload, tokens.remainder);
        (payload, outcome)
    }

    /// Listen again after a flush. The state drops to idle unless the
    /// other buffer still holds bytes.
    fn settle(&mut self) -> Result<()> {
        self.force = false;
        self.state = self.pending_state();
        self.radio.arm_rx()
    }
}

/// Append `bytes`, dropping its opening FEND when `payload` already ends
/// with the delimiter it shared.
fn append_frame(payload: &mut Vec<u8>, bytes: &[u8]) {
    let bytes = match bytes.split_first() {
        Some((&FEND, rest)) if payload.last() == Some(&FEND) => rest,
        _ => bytes,
    };
    payload.extend_from_slice(bytes);
}

impl<T, S, C> std::fmt::Debug for Tnc<T, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tnc")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("radio_buffered", &self.radio_buf.len())
            .field("terminal_buffered", &self.terminal_buf.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::io::ErrorKind;
    use std::sync::{Arc, Mutex};

    use tncbridge_block::{BlockConfig, BlockType};
    use tncbridge_kiss::data_frame;
    use tncbridge_radio::{compile, RadioIntent};
    use tncbridge_transport::{pair, ManualClock, MemoryLink};

    use super::*;

    const TX_ACK: [u8; 11] = [2, 9, 1, 1, 1, 0, 0, 0, 0, 0, 0];

    #[derive(Default)]
    struct ScriptState {
        input: Vec<u8>,
        output: VecDeque<u8>,
        replies: HashMap<u8, VecDeque<Vec<u8>>>,
        written: Vec<u8>,
        commands: Vec<u8>,
    }

    /// Device stand-in that answers each command as it is written.
    ///
    /// INIT, RX_CANCEL and TX get their usual answers unless a reply was
    /// queued with [`Script::reply_to`]. RX answers only come from
    /// [`Script::inject`].
    #[derive(Clone, Default)]
    struct Script(Arc<Mutex<ScriptState>>);

    impl Script {
        fn reply_to(&self, kind: BlockType, block: &[u8]) {
            let mut state = self.0.lock().unwrap();
            state
                .replies
                .entry(kind.code())
                .or_default()
                .push_back(block.to_vec());
        }

        fn inject(&self, block: &[u8]) {
            self.0.lock().unwrap().output.extend(block);
        }

        /// Command types written since the last call.
        fn commands(&self) -> Vec<u8> {
            std::mem::take(&mut self.0.lock().unwrap().commands)
        }

        /// Bytes written since the last call.
        fn written(&self) -> Vec<u8> {
            std::mem::take(&mut self.0.lock().unwrap().written)
        }
    }

    fn default_reply(kind: u8) -> Option<Vec<u8>> {
        match BlockType::from_u8(kind) {
            Some(BlockType::Init) => Some(vec![1, 0]),
            Some(BlockType::RxCancel) => Some(vec![6, 0]),
            Some(BlockType::Tx) => Some(TX_ACK.to_vec()),
            _ => None,
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut state = self.0.lock().unwrap();
            if state.output.is_empty() {
                return Err(ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(state.output.len());
            for (slot, byte) in buf.iter_mut().zip(state.output.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut state = self.0.lock().unwrap();
            state.written.extend_from_slice(buf);
            state.input.extend_from_slice(buf);
            while state.input.len() >= 2 && state.input.len() >= 2 + usize::from(state.input[1]) {
                let total = 2 + usize::from(state.input[1]);
                let kind = state.input[0];
                state.input.drain(..total);
                state.commands.push(kind);
                let queued = state.replies.get_mut(&kind).and_then(VecDeque::pop_front);
                if let Some(reply) = queued.or_else(|| default_reply(kind)) {
                    state.output.extend(reply);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Duplex for Script {
        fn try_clone(&self) -> tncbridge_transport::Result<Self> {
            Ok(self.clone())
        }
    }

    struct Rig {
        tnc: Tnc<MemoryLink, Script, ManualClock>,
        device: Script,
        app: MemoryLink,
        clock: ManualClock,
    }

    fn tnc(config: TncConfig) -> (Tnc<MemoryLink, Script, ManualClock>, Script, MemoryLink, ManualClock) {
        let device = Script::default();
        let (terminal, app) = pair();
        let clock = ManualClock::new();
        let parms = compile(&RadioIntent {
            packet_length: 32,
            ..RadioIntent::default()
        });
        let radio =
            RadioLink::open(device.clone(), clock.clone(), parms, BlockConfig::default()).unwrap();
        (Tnc::new(terminal, radio, config), device, app, clock)
    }

    fn rig(config: TncConfig) -> Rig {
        let (mut tnc, device, app, clock) = tnc(config);
        tnc.start().unwrap();
        device.commands();
        device.written();
        Rig {
            tnc,
            device,
            app,
            clock,
        }
    }

    fn rx_answer(data: &[u8]) -> Vec<u8> {
        let mut block = vec![BlockType::Rx.code(), (data.len() + 4) as u8];
        block.push(data.len() as u8 + 1);
        block.push(0);
        block.extend_from_slice(data);
        block.extend_from_slice(&[0x20, 0x85]);
        block
    }

    fn immediate() -> TncConfig {
        TncConfig {
            serial_window: Duration::ZERO,
            ..TncConfig::default()
        }
    }

    #[test]
    fn start_inits_and_arms() {
        let (mut tnc, device, _app, _clock) = tnc(TncConfig::default());
        tnc.start().unwrap();

        assert_eq!(device.commands(), vec![1, 4]);
        assert!(tnc.radio().is_rx_armed());
        assert_eq!(tnc.state(), TriState::Idle);
    }

    #[test]
    fn radio_packet_goes_to_terminal_at_once() {
        let mut rig = rig(TncConfig::default());
        rig.device.inject(&rx_answer(b"\xC0\x00abc\xC0"));

        rig.tnc.step().unwrap();
        assert_eq!(rig.app.drain(), b"\xC0\x00abc\xC0");
        assert_eq!(rig.tnc.state(), TriState::Idle);
        // Reception re-armed after the flush.
        assert_eq!(rig.device.commands(), vec![4]);
    }

    #[test]
    fn terminal_bytes_wait_for_serial_window() {
        let mut rig = rig(TncConfig::default());
        let frame = data_frame(0, b"hello");
        rig.app.write_all(&frame).unwrap();

        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.state(), TriState::TxActive);
        assert!(rig.device.commands().is_empty());

        // The window runs out with nothing from the radio: forced flush.
        rig.clock.advance(Duration::from_millis(41));
        rig.tnc.step().unwrap();
        assert!(rig.device.commands().is_empty());
        rig.tnc.step().unwrap();

        let written = rig.device.written();
        assert_eq!(rig.device.commands(), vec![6, 2, 4]);
        // RX_CANCEL header, TX header, used length and countdown, then the frame.
        assert_eq!(&written[6..6 + frame.len()], frame.as_slice());
        assert_eq!(rig.tnc.stats().packets_to_radio, 1);
    }

    #[test]
    fn radio_traffic_during_tx_cancels_before_sending() {
        let mut rig = rig(TncConfig::default());
        rig.app.write_all(&data_frame(0, b"out")).unwrap();
        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.state(), TriState::TxActive);

        rig.device.inject(&rx_answer(b"in"));
        rig.tnc.step().unwrap();

        // Radio side forwarded first, then cancel, transmit, re-arm.
        assert_eq!(rig.app.drain(), b"in");
        assert_eq!(rig.device.commands(), vec![4, 6, 2, 4]);
        assert_eq!(rig.tnc.state(), TriState::Idle);
    }

    #[test]
    fn config_frames_are_consumed() {
        let mut rig = rig(immediate());
        rig.app.write_all(&[0xC0, 0x01, 25, 0xC0]).unwrap();

        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.kiss_params().keyup_delay, Duration::from_millis(250));
        assert_eq!(rig.tnc.stats().config_frames, 1);
        // Cancel and re-arm, nothing transmitted.
        assert_eq!(rig.device.commands(), vec![6, 4]);
    }

    #[test]
    fn data_and_config_frames_split() {
        let mut rig = rig(immediate());
        let data = data_frame(0, b"payload");
        let mut stream = vec![0xC0, 0x03, 20, 0xC0];
        stream.extend_from_slice(&data);
        rig.app.write_all(&stream).unwrap();

        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.kiss_params().slot_time, Duration::from_millis(200));
        let written = rig.device.written();
        assert_eq!(rig.device.commands(), vec![6, 2, 4]);
        assert_eq!(written[4], data.len() as u8 + 1);
        assert_eq!(&written[6..6 + data.len()], data.as_slice());
    }

    #[test]
    fn shared_delimiter_is_sent_once() {
        let mut rig = rig(immediate());
        let stream = [0xC0, 0x00, b'a', 0xC0, 0x00, b'b'];
        rig.app.write_all(&stream).unwrap();

        rig.tnc.step().unwrap();
        let written = rig.device.written();
        assert_eq!(rig.device.commands(), vec![6, 2, 4]);
        assert_eq!(written[4], stream.len() as u8 + 1);
        assert_eq!(&written[6..6 + stream.len()], stream.as_slice());
    }

    #[test]
    fn config_frame_between_data_frames() {
        let mut rig = rig(immediate());
        let stream = [
            0xC0, 0x00, b'a', 0xC0, 0x01, 30, 0xC0, 0x00, b'b', 0xC0,
        ];
        rig.app.write_all(&stream).unwrap();

        rig.tnc.step().unwrap();
        let written = rig.device.written();
        let sent = [0xC0, 0x00, b'a', 0xC0, 0x00, b'b', 0xC0];
        assert_eq!(written[4], sent.len() as u8 + 1);
        assert_eq!(&written[6..6 + sent.len()], sent.as_slice());
        assert_eq!(rig.tnc.kiss_params().keyup_delay, Duration::from_millis(300));
    }

    #[test]
    fn slip_mode_forwards_command_bytes() {
        let mut rig = rig(TncConfig {
            slip: true,
            ..immediate()
        });
        rig.app.write_all(&[0xC0, 0x01, 25, 0xC0]).unwrap();

        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.kiss_params().keyup_delay, Duration::from_millis(4));
        assert_eq!(rig.device.commands(), vec![6, 2, 4]);
    }

    #[test]
    fn abort_command_stops_the_loop() {
        let mut rig = rig(immediate());
        rig.app.write_all(&[0xC0, 0x0F, 0xC0]).unwrap();

        assert_eq!(rig.tnc.step().unwrap(), ParamOutcome::Abort);
        assert!(!rig.tnc.radio().is_rx_armed());
    }

    #[test]
    fn failed_transmission_is_dropped() {
        let mut rig = rig(immediate());
        rig.device.reply_to(
            BlockType::Tx,
            &[BlockType::TxKo.code(), 9, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        );
        rig.app.write_all(&data_frame(0, b"lost")).unwrap();

        assert_eq!(rig.tnc.step().unwrap(), ParamOutcome::Continue);
        assert_eq!(rig.tnc.stats().radio_errors, 1);
        assert_eq!(rig.tnc.stats().packets_to_radio, 0);
        assert!(rig.tnc.radio().is_rx_armed());
    }

    #[test]
    fn failed_cancel_reinitialises_radio() {
        let mut rig = rig(immediate());
        rig.device.reply_to(BlockType::RxCancel, &[BlockType::Error.code(), 1, 6]);
        rig.app.write_all(&data_frame(0, b"x")).unwrap();

        rig.tnc.step().unwrap();
        assert_eq!(rig.device.commands(), vec![6, 1, 2, 4]);
    }

    #[test]
    fn radio_window_gathers_packets() {
        let mut rig = rig(TncConfig {
            radio_window: Duration::from_millis(20),
            ..TncConfig::default()
        });
        rig.device.inject(&rx_answer(b"one"));
        rig.tnc.step().unwrap();
        assert!(rig.app.drain().is_empty());
        assert_eq!(rig.tnc.state(), TriState::RxActive);

        rig.device.inject(&rx_answer(b"two"));
        rig.tnc.step().unwrap();
        assert!(rig.app.drain().is_empty());

        rig.clock.advance(Duration::from_millis(21));
        rig.tnc.step().unwrap();
        rig.tnc.step().unwrap();
        assert_eq!(rig.app.drain(), b"onetwo");
    }

    #[test]
    fn reception_error_rearms() {
        let mut rig = rig(TncConfig::default());
        rig.device.inject(&[BlockType::RxKo.code(), 9, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.stats().radio_errors, 1);
        assert_eq!(rig.device.commands(), vec![4]);
        assert_eq!(rig.tnc.state(), TriState::Idle);
    }

    #[test]
    fn reception_error_keeps_terminal_window() {
        let mut rig = rig(TncConfig::default());
        let frame = data_frame(0, b"queued");
        rig.app.write_all(&frame).unwrap();
        rig.tnc.step().unwrap();

        rig.device.inject(&[BlockType::RxKo.code(), 9, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.stats().radio_errors, 1);
        assert_eq!(rig.tnc.state(), TriState::TxActive);
        assert_eq!(rig.device.commands(), vec![4]);

        rig.clock.advance(Duration::from_millis(41));
        rig.tnc.step().unwrap();
        rig.tnc.step().unwrap();
        let written = rig.device.written();
        assert_eq!(rig.device.commands(), vec![6, 2, 4]);
        assert_eq!(&written[6..6 + frame.len()], frame.as_slice());
        assert_eq!(rig.tnc.stats().packets_to_radio, 1);
        assert_eq!(rig.tnc.state(), TriState::Idle);
    }

    #[test]
    fn terminal_bytes_outlive_radio_flush() {
        let mut rig = rig(TncConfig {
            radio_window: Duration::from_millis(20),
            ..TncConfig::default()
        });
        rig.device.inject(&rx_answer(b"in"));
        rig.tnc.step().unwrap();
        assert_eq!(rig.tnc.state(), TriState::RxActive);

        // Terminal bytes turn the link around: radio side flushed, terminal
        // side still waits for its own window.
        rig.app.write_all(&data_frame(0, b"out")).unwrap();
        rig.tnc.step().unwrap();
        assert_eq!(rig.app.drain(), b"in");
        assert_eq!(rig.tnc.state(), TriState::TxActive);
        assert_eq!(rig.device.commands(), vec![4]);

        rig.clock.advance(Duration::from_millis(41));
        rig.tnc.step().unwrap();
        rig.tnc.step().unwrap();
        assert_eq!(rig.device.commands(), vec![6, 2, 4]);
        assert_eq!(rig.tnc.stats().packets_to_radio, 1);
    }

    #[test]
    fn run_honours_stop_flag() {
        let (mut tnc, device, _app, _clock) = tnc(TncConfig::default());
        let stop = AtomicBool::new(true);

        let stats = tnc.run(&stop).unwrap();
        assert_eq!(stats.iterations, 0);
        // Init, arm, then cancel on the way out.
        assert_eq!(device.commands(), vec![1, 4, 6]);
    }
}
