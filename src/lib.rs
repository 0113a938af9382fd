#![warn(missing_docs)]

//! Adlens is a passive [Bluetooth Low Energy] (BLE) advertisement decoder for [Rust]. It turns raw advertising
//! events into structured records and, optionally, enriches every advertised service with characteristic metadata
//! fetched live from the peripheral.
//!
//! The crate owns no radio and no platform bindings. The advertisement source, the GATT client and the log sink are
//! collaborators supplied by the caller through small traits; Adlens provides the decoding, the enrichment
//! orchestration and the report rendering in between.
//!
//! [Rust]: https://www.rust-lang.org/
//! [Bluetooth Low Energy]: https://www.bluetooth.com/specifications/specs/
//!
//! # Usage
//!
//! ```rust,no_run
//!# use adlens::{parse, Enrichment, RenderOptions};
//!let payload = [0x02, 0x01, 0x06, 0x03, 0x03, 0xAA, 0xFE];
//!let record = parse(&payload).unwrap_or_else(|err| err.into_partial());
//!assert_eq!(record.flags.map(|f| f.bits()), Some(0x06));
//!
//!for line in adlens::render::render_record(&record, &Enrichment::default(), 0, &RenderOptions::default()) {
//!    println!("{line}");
//!}
//! ```
//!
//! # Overview
//!
//! The pipeline for a single [`AdvertisementEvent`] is:
//!
//! - [Parse][parse] the payload into an [`AdvertisementRecord`]. A truncated payload yields a
//!   [`ParseError`] which still carries everything decoded before the truncation.
//! - [Resolve][Resolver::resolve_record] every distinct service UUID, and the advertising device's address, against
//!   a [`GattClient`]. Lookups run concurrently, each bounded by a timeout, and failures are recorded per identifier
//!   as a [`LookupError`].
//! - [Render][render()] the event, record and enrichment into indented text lines.
//! - Hand the lines to a [`LogSink`].
//!
//! [`process_batch`][watcher::process_batch] runs that pipeline for every event of a batch, and
//! [`Watcher::run`][watcher::Watcher::run] drives it from a stream of batches.
//!
//! # Asynchronous runtimes
//!
//! Adlens does not spawn tasks and should work with any asynchronous runtime. Timeouts are implemented with
//! `futures-timer`.
//!
//! # Feature flags
//!
//! The `serde` feature is available to enable serializing/deserializing records, lookup results and
//! [`ResolverConfig`].

pub mod ad;
pub mod btuuid;
pub mod cancel;
pub mod error;
pub mod gatt;
pub mod hexcodec;
pub mod render;
pub mod resolver;
pub mod sink;
mod util;
pub mod watcher;

use chrono::{DateTime, Utc};
use num_enum::TryFromPrimitive;

pub use ad::parse;
pub use btuuid::BluetoothUuidExt;
pub use cancel::{CancelHandle, CancelToken};
pub use error::{EncodeError, LookupError, ParseError, ParseErrorKind, ParseWarning};
pub use gatt::{CharacteristicDescriptor, GattClient, ServiceDescriptor};
pub use render::{render, RenderOptions};
pub use resolver::{Enrichment, EnrichmentResult, Identifier, Resolver, ResolverConfig};
pub use sink::{LogSink, MemorySink, TracingSink};
pub use uuid::Uuid;

/// A 48-bit Bluetooth device address.
///
/// The value is stored in the low 48 bits of a `u64`, most significant octet first, as it is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address(u64);

impl Address {
    const MASK: u64 = (1 << 48) - 1;

    /// Creates an address from the low 48 bits of `raw`. Higher bits are discarded.
    pub const fn new(raw: u64) -> Self {
        Address(raw & Self::MASK)
    }

    /// The address as an integer.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The six address octets, most significant first.
    pub fn octets(self) -> [u8; 6] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }
}

impl From<[u8; 6]> for Address {
    fn from(octets: [u8; 6]) -> Self {
        let mut b = [0u8; 8];
        b[2..].copy_from_slice(&octets);
        Address(u64::from_be_bytes(b))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let o = self.octets();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl std::fmt::UpperHex for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::UpperHex::fmt(&self.0, f)
    }
}

/// The PDU type of a received advertisement. Discriminants match the HCI LE Advertising Report event types
/// (Core Specification Vol 4, Part E, §7.7.65.2).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdvertisementKind {
    /// Connectable undirected advertising (ADV_IND)
    Connectable = 0x00,
    /// Scannable undirected advertising (ADV_SCAN_IND)
    ScannableNonConnectable = 0x02,
    /// Non connectable undirected advertising (ADV_NONCONN_IND)
    NonConnectable = 0x03,
    /// Scan response (SCAN_RSP)
    ScanResponse = 0x04,
}

impl AdvertisementKind {
    /// Name used when rendering reports.
    pub fn name(self) -> &'static str {
        match self {
            AdvertisementKind::Connectable => "Connectable",
            AdvertisementKind::ScannableNonConnectable => "ScannableNonConnectable",
            AdvertisementKind::NonConnectable => "NonConnectable",
            AdvertisementKind::ScanResponse => "ScanResponse",
        }
    }
}

/// A raw advertisement as delivered by the advertisement source.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisementEvent {
    /// The advertiser's address
    pub address: Address,
    /// The advertising PDU type
    pub kind: AdvertisementKind,
    /// The signal strength in dBm of the received advertisement packet
    pub rssi: i16,
    /// When the advertisement was received
    pub timestamp: DateTime<Utc>,
    /// The concatenated AD structures of the advertisement
    pub payload: Vec<u8>,
}

/// Data decoded from the AD structures of one advertisement.
///
/// Every byte of a well-formed payload lands in exactly one field: structures without a dedicated field are kept in
/// [`data_sections`][Self::data_sections].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisementRecord {
    /// The (possibly shortened) local name of the device (CSS §A.1.2)
    pub local_name: Option<String>,
    /// Advertised GATT service UUIDs in payload order, duplicates included (CSS §A.1.1)
    pub services: Vec<Uuid>,
    /// Advertising flags (CSS §A.1.3). `None` when no flags structure was present.
    pub flags: Option<AdvertisementFlags>,
    /// Manufacturer specific data blocks in payload order (CSS §A.1.4)
    pub manufacturer_data: Vec<ManufacturerData>,
    /// Every other AD structure, verbatim, in payload order
    pub data_sections: Vec<DataSection>,
    /// Problems the decoder recovered from
    pub warnings: Vec<ParseWarning>,
}

impl AdvertisementRecord {
    /// Returns `true` if nothing was decoded.
    pub fn is_empty(&self) -> bool {
        self.local_name.is_none()
            && self.services.is_empty()
            && self.flags.is_none()
            && self.manufacturer_data.is_empty()
            && self.data_sections.is_empty()
    }
}

/// Manufacturer specific data included in Bluetooth advertisements. See the Bluetooth Core Specification Supplement
/// §A.1.4 for details.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManufacturerData {
    /// Company identifier (defined [here](https://www.bluetooth.com/specifications/assigned-numbers/company-identifiers/))
    pub company_id: u16,
    /// Manufacturer specific data
    pub data: Vec<u8>,
}

/// An AD structure without a dedicated field in [`AdvertisementRecord`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSection {
    /// AD type tag
    pub ad_type: u8,
    /// The structure's data field
    pub data: Vec<u8>,
}

/// Advertising flags as defined in the Core Specification Supplement, Part A, §1.3.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisementFlags(u8);

impl AdvertisementFlags {
    /// LE Limited Discoverable Mode
    pub const LIMITED_DISCOVERABLE_MODE: u8 = 1 << 0;
    /// LE General Discoverable Mode
    pub const GENERAL_DISCOVERABLE_MODE: u8 = 1 << 1;
    /// BR/EDR Not Supported
    pub const CLASSIC_NOT_SUPPORTED: u8 = 1 << 2;
    /// Simultaneous LE and BR/EDR to Same Device Capable (Controller)
    pub const DUAL_MODE_CONTROLLER_CAPABLE: u8 = 1 << 3;
    /// Simultaneous LE and BR/EDR to Same Device Capable (Host)
    pub const DUAL_MODE_HOST_CAPABLE: u8 = 1 << 4;

    const NAMES: [(u8, &'static str); 5] = [
        (Self::LIMITED_DISCOVERABLE_MODE, "LimitedDiscoverableMode"),
        (Self::GENERAL_DISCOVERABLE_MODE, "GeneralDiscoverableMode"),
        (Self::CLASSIC_NOT_SUPPORTED, "ClassicNotSupported"),
        (Self::DUAL_MODE_CONTROLLER_CAPABLE, "DualModeControllerCapable"),
        (Self::DUAL_MODE_HOST_CAPABLE, "DualModeHostCapable"),
    ];

    /// Raw transmutation from [`u8`].
    pub const fn from_bits(bits: u8) -> Self {
        AdvertisementFlags(bits)
    }

    /// Raw transmutation to [`u8`].
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit of `flag` is set.
    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Symbolic names of the set bits, lowest bit first.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| name)
    }

    /// Bits without a symbolic name.
    pub fn unknown_bits(self) -> u8 {
        Self::NAMES.iter().fold(self.0, |rest, (bit, _)| rest & !bit)
    }
}

impl std::fmt::Display for AdvertisementFlags {
    /// Formats as `(0x6) GeneralDiscoverableMode, ClassicNotSupported`. An empty bitfield is `None`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(0x{:X}) ", self.0)?;
        if self.0 == 0 {
            return f.write_str("None");
        }
        let mut parts: Vec<String> = self.names().map(str::to_owned).collect();
        let unknown = self.unknown_bits();
        if unknown != 0 {
            parts.push(format!("0x{unknown:X}"));
        }
        f.write_str(&parts.join(", "))
    }
}
