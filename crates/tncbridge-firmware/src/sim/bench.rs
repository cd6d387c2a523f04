use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};

use tncbridge_transport::Duplex;

use crate::device::{BlockAssembler, Device};
use crate::sim::chip::{SimChip, SimLines};

/// Ticks run per host read, bounding how far the air moves per poll.
const TICKS_PER_PUMP: usize = 4;

/// Channel between stations: link quality and fault injection.
#[derive(Debug, Clone)]
pub struct Ether {
    /// Raw RSSI register value seen by receivers.
    pub rssi: u8,
    /// LQI reported with good packets.
    pub lqi: u8,
    /// Packets still to be delivered with a CRC error.
    pub corrupt: usize,
    /// Packets still to be lost entirely.
    pub lose: usize,
    /// Packets transmitted so far.
    pub transmitted: usize,
}

impl Default for Ether {
    fn default() -> Self {
        Self {
            rssi: 0x20,
            lqi: 0x05,
            corrupt: 0,
            lose: 0,
            transmitted: 0,
        }
    }
}

pub type SimDevice = Device<SimChip, SimLines>;

struct Station {
    device: SimDevice,
    input: BlockAssembler,
    output: VecDeque<u8>,
}

/// Simulated microcontrollers sharing one radio channel.
pub struct Bench {
    stations: Vec<Station>,
    ether: Ether,
}

impl Bench {
    pub fn new(stations: usize) -> Self {
        Self {
            stations: (0..stations)
                .map(|_| Station {
                    device: Device::new(SimChip::new(), SimLines::default()),
                    input: BlockAssembler::new(),
                    output: VecDeque::new(),
                })
                .collect(),
            ether: Ether::default(),
        }
    }

    /// A bench behind a lock, ready to hand out ports.
    pub fn shared(stations: usize) -> Arc<Mutex<Bench>> {
        Arc::new(Mutex::new(Self::new(stations)))
    }

    /// Host-side USB port of `station`.
    pub fn port(bench: &Arc<Mutex<Bench>>, station: usize) -> SoftPort {
        SoftPort {
            bench: Arc::clone(bench),
            station,
        }
    }

    pub fn ether_mut(&mut self) -> &mut Ether {
        &mut self.ether
    }

    pub fn device(&self, station: usize) -> Option<&SimDevice> {
        self.stations.get(station).map(|s| &s.device)
    }

    pub fn device_mut(&mut self, station: usize) -> Option<&mut SimDevice> {
        self.stations.get_mut(station).map(|s| &mut s.device)
    }

    /// Dispatch pending host blocks, then run the air for a few ticks.
    pub fn pump(&mut self) {
        for station in &mut self.stations {
            while let Some(block) = station.input.next_block() {
                station.device.handle_block(&block);
            }
        }
        for _ in 0..TICKS_PER_PUMP {
            self.tick();
        }
        for station in &mut self.stations {
            while let Some(reply) = station.device.poll_reply() {
                station.output.extend(reply.iter().copied());
            }
        }
    }

    fn tick(&mut self) {
        let mut frames = Vec::new();
        for (index, station) in self.stations.iter_mut().enumerate() {
            let tick = station.device.chip_mut().tick();
            for (line, edge) in tick.edges {
                if let Some(event) = station.device.lines_mut().latch(line, edge) {
                    station.device.on_event(event);
                }
            }
            if let Some(frame) = tick.frame {
                frames.push((index, frame));
            }
        }

        for (from, frame) in frames {
            self.ether.transmitted += 1;
            if self.ether.lose > 0 {
                self.ether.lose -= 1;
                continue;
            }
            let crc_lqi = if self.ether.corrupt > 0 {
                self.ether.corrupt -= 1;
                self.ether.lqi & 0x7F
            } else {
                0x80 | (self.ether.lqi & 0x7F)
            };
            for (index, station) in self.stations.iter_mut().enumerate() {
                if index != from {
                    station
                        .device
                        .chip_mut()
                        .receive(&frame, self.ether.rssi, crc_lqi);
                }
            }
        }
    }
}

/// Host end of a station's USB link.
#[derive(Clone)]
pub struct SoftPort {
    bench: Arc<Mutex<Bench>>,
    station: usize,
}

impl std::fmt::Debug for SoftPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftPort")
            .field("station", &self.station)
            .finish_non_exhaustive()
    }
}

fn poisoned() -> std::io::Error {
    std::io::Error::new(ErrorKind::Other, "bench poisoned")
}

fn no_station() -> std::io::Error {
    std::io::Error::new(ErrorKind::NotFound, "no such station")
}

impl Read for SoftPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut bench = self.bench.lock().map_err(|_| poisoned())?;
        bench.pump();
        let station = bench.stations.get_mut(self.station).ok_or_else(no_station)?;
        if station.output.is_empty() {
            return Err(ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(station.output.len());
        for (slot, byte) in buf.iter_mut().zip(station.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SoftPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut bench = self.bench.lock().map_err(|_| poisoned())?;
        let station = bench.stations.get_mut(self.station).ok_or_else(no_station)?;
        match station.input.feed(buf) {
            0 if !buf.is_empty() => Err(ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Duplex for SoftPort {
    fn try_clone(&self) -> tncbridge_transport::Result<Self> {
        Ok(self.clone())
    }
}
