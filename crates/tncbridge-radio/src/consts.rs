//! Fixed hardware constants and the enumerations the compiler accepts.

/// CC1101 reference crystal.
pub const XTAL_HZ: f64 = 26_000_000.0;

/// Hardware FIFO depth of the radio chip, in bytes.
pub const FIFO_SIZE: usize = 64;

/// Ceiling applied to 4-level modulation rates.
pub const FSK4_MAX_RATE: f64 = 300_000.0;

/// Channel bandwidth steps indexed by `4 * exponent + mantissa`, widest first.
pub const CHANBW_LIMITS: [f64; 16] = [
    812_000.0, 650_000.0, 541_000.0, 464_000.0, //
    406_000.0, 325_000.0, 270_000.0, 232_000.0, //
    203_000.0, 162_000.0, 135_000.0, 116_000.0, //
    102_000.0, 81_000.0, 68_000.0, 58_000.0,
];

/// Nominal data rate classes in baud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum DataRate {
    R50,
    R110,
    R300,
    R600,
    R1200,
    R2400,
    R4800,
    #[default]
    R9600,
    R14400,
    R19200,
    R28800,
    R38400,
    R57600,
    R76800,
    R115200,
    R250000,
    R500000,
}

impl DataRate {
    pub const ALL: [DataRate; 17] = [
        DataRate::R50,
        DataRate::R110,
        DataRate::R300,
        DataRate::R600,
        DataRate::R1200,
        DataRate::R2400,
        DataRate::R4800,
        DataRate::R9600,
        DataRate::R14400,
        DataRate::R19200,
        DataRate::R28800,
        DataRate::R38400,
        DataRate::R57600,
        DataRate::R76800,
        DataRate::R115200,
        DataRate::R250000,
        DataRate::R500000,
    ];

    pub const fn baud(self) -> u32 {
        match self {
            DataRate::R50 => 50,
            DataRate::R110 => 110,
            DataRate::R300 => 300,
            DataRate::R600 => 600,
            DataRate::R1200 => 1200,
            DataRate::R2400 => 2400,
            DataRate::R4800 => 4800,
            DataRate::R9600 => 9600,
            DataRate::R14400 => 14400,
            DataRate::R19200 => 19200,
            DataRate::R28800 => 28800,
            DataRate::R38400 => 38400,
            DataRate::R57600 => 57600,
            DataRate::R76800 => 76800,
            DataRate::R115200 => 115200,
            DataRate::R250000 => 250000,
            DataRate::R500000 => 500000,
        }
    }

    /// Look up the class carrying exactly `baud`.
    pub fn from_baud(baud: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.baud() == baud)
    }
}

/// Modulation schemes understood by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Modulation {
    Ook,
    #[default]
    Fsk2,
    Fsk4,
    Msk,
    Gfsk,
}

impl Modulation {
    /// MOD_FORMAT register value.
    pub const fn word(self) -> u8 {
        match self {
            Modulation::Ook => 3,
            Modulation::Fsk2 => 0,
            Modulation::Fsk4 => 4,
            Modulation::Msk => 7,
            Modulation::Gfsk => 1,
        }
    }

    pub const fn from_word(word: u8) -> Option<Self> {
        match word {
            3 => Some(Modulation::Ook),
            0 => Some(Modulation::Fsk2),
            4 => Some(Modulation::Fsk4),
            7 => Some(Modulation::Msk),
            1 => Some(Modulation::Gfsk),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Modulation::Ook => "OOK",
            Modulation::Fsk2 => "2-FSK",
            Modulation::Fsk4 => "4-FSK",
            Modulation::Msk => "MSK",
            Modulation::Gfsk => "GFSK",
        }
    }
}

/// Preamble length classes; the discriminant is the 3-bit NUM_PREAMBLE value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Preamble {
    Bytes2 = 0,
    Bytes3 = 1,
    #[default]
    Bytes4 = 2,
    Bytes6 = 3,
    Bytes8 = 4,
    Bytes12 = 5,
    Bytes16 = 6,
    Bytes24 = 7,
}

impl Preamble {
    pub const fn bytes(self) -> u8 {
        match self {
            Preamble::Bytes2 => 2,
            Preamble::Bytes3 => 3,
            Preamble::Bytes4 => 4,
            Preamble::Bytes6 => 6,
            Preamble::Bytes8 => 8,
            Preamble::Bytes12 => 12,
            Preamble::Bytes16 => 16,
            Preamble::Bytes24 => 24,
        }
    }

    pub const fn class(self) -> u8 {
        self as u8
    }

    pub fn from_bytes(bytes: u8) -> Option<Self> {
        [
            Preamble::Bytes2,
            Preamble::Bytes3,
            Preamble::Bytes4,
            Preamble::Bytes6,
            Preamble::Bytes8,
            Preamble::Bytes12,
            Preamble::Bytes16,
            Preamble::Bytes24,
        ]
        .into_iter()
        .find(|p| p.bytes() == bytes)
    }
}

/// LENGTH_CONFIG values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PacketLengthMode {
    #[default]
    Fixed = 0,
    Variable = 1,
    Infinite = 2,
}

impl PacketLengthMode {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(PacketLengthMode::Fixed),
            1 => Some(PacketLengthMode::Variable),
            2 => Some(PacketLengthMode::Infinite),
            _ => None,
        }
    }
}

/// SYNC_MODE values. Only 30/32 is ever compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SyncMode {
    None = 0,
    Bits15Of16 = 1,
    Bits16Of16 = 2,
    #[default]
    Bits30Of32 = 3,
    Carrier = 4,
    Bits15Of16Carrier = 5,
    Bits16Of16Carrier = 6,
    Bits30Of32Carrier = 7,
}
