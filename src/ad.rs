//! Decoding and encoding of the AD structures carried in an advertising payload.
//!
//! A payload is a sequence of structures, each a length octet `L` followed by an AD type octet and `L - 1` octets of
//! data (Core Specification Vol 3, Part C, §11).

use num_enum::TryFromPrimitive;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::btuuid::{BluetoothUuidExt, UuidWidth};
use crate::error::{EncodeError, ParseError, ParseErrorKind, ParseWarning};
use crate::{AdvertisementFlags, AdvertisementRecord, DataSection, ManufacturerData};

/// AD types with a dedicated field in [`AdvertisementRecord`]. See the Bluetooth Assigned Numbers, §2.3.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive)]
pub enum AdType {
    /// Flags
    Flags = 0x01,
    /// Incomplete List of 16-bit Service UUIDs
    IncompleteServices16 = 0x02,
    /// Complete List of 16-bit Service UUIDs
    CompleteServices16 = 0x03,
    /// Incomplete List of 128-bit Service UUIDs
    IncompleteServices128 = 0x06,
    /// Complete List of 128-bit Service UUIDs
    CompleteServices128 = 0x07,
    /// Shortened Local Name
    ShortenedLocalName = 0x08,
    /// Complete Local Name
    CompleteLocalName = 0x09,
    /// Manufacturer Specific Data
    ManufacturerSpecificData = 0xFF,
}

impl AdType {
    fn uuid_width(self) -> Option<UuidWidth> {
        match self {
            AdType::IncompleteServices16 | AdType::CompleteServices16 => Some(UuidWidth::Bits16),
            AdType::IncompleteServices128 | AdType::CompleteServices128 => Some(UuidWidth::Bits128),
            _ => None,
        }
    }
}

/// One AD structure borrowed from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    /// Offset of the structure's length octet within the payload
    pub offset: usize,
    /// AD type tag
    pub ad_type: u8,
    /// The data field
    pub data: &'a [u8],
}

/// Bounds-checked iterator over the AD structures of a payload.
///
/// Yields `Err` once, for the first structure whose declared length runs past the end of the payload, and then
/// stops. Zero length octets are significant-part padding and are skipped.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> AdStructures<'a> {
    /// Iterates the structures of `payload`.
    pub fn new(payload: &'a [u8]) -> Self {
        AdStructures { payload, pos: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = Result<AdStructure<'a>, (usize, ParseErrorKind)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let offset = self.pos;
            let len = *self.payload.get(offset)? as usize;
            let available = self.payload.len() - offset - 1;

            if len == 0 {
                self.pos += 1;
                continue;
            }

            if len > available {
                self.pos = self.payload.len();
                return Some(Err((
                    offset,
                    ParseErrorKind::TruncatedStructure {
                        declared: len,
                        available,
                    },
                )));
            }

            self.pos = offset + 1 + len;
            return Some(Ok(AdStructure {
                offset,
                ad_type: self.payload[offset + 1],
                data: &self.payload[offset + 2..offset + 1 + len],
            }));
        }
    }
}

/// Decodes an advertising payload.
///
/// An empty payload decodes to an empty record. If a structure is truncated, decoding stops there and the returned
/// [`ParseError`] carries every structure decoded before it.
pub fn parse(payload: &[u8]) -> Result<AdvertisementRecord, ParseError> {
    let mut record = AdvertisementRecord::default();

    for item in AdStructures::new(payload) {
        match item {
            Ok(structure) => record.apply(structure),
            Err((offset, kind)) => {
                warn!("{} at offset {}", kind, offset);
                return Err(ParseError::new(kind, offset, record));
            }
        }
    }

    Ok(record)
}

impl AdvertisementRecord {
    /// Decodes an advertising payload. See [`parse`].
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        parse(payload)
    }

    fn apply(&mut self, structure: AdStructure<'_>) {
        let AdStructure { offset, ad_type, data } = structure;
        trace!(offset, ad_type, len = data.len(), "AD structure");

        let Ok(kind) = AdType::try_from(ad_type) else {
            self.push_section(ad_type, data);
            return;
        };

        match kind {
            AdType::Flags => match data {
                [bits] => self.flags = Some(AdvertisementFlags::from_bits(*bits)),
                _ => self.malformed(ad_type, data),
            },
            AdType::IncompleteServices16
            | AdType::CompleteServices16
            | AdType::IncompleteServices128
            | AdType::CompleteServices128 => {
                let width = kind.uuid_width().unwrap_or(UuidWidth::Bits128);
                if data.len() % width.len() != 0 {
                    self.malformed(ad_type, data);
                    return;
                }
                self.services
                    .extend(data.chunks_exact(width.len()).filter_map(Uuid::from_ad_bytes));
            }
            AdType::ShortenedLocalName | AdType::CompleteLocalName => match std::str::from_utf8(data) {
                Ok(name) => self.local_name = Some(name.to_owned()),
                Err(err) => {
                    warn!(ad_type, "local name is not valid UTF-8: {}", err);
                    self.local_name = None;
                    self.warnings.push(ParseWarning::TextDecode { ad_type });
                }
            },
            AdType::ManufacturerSpecificData => match data {
                [lo, hi, rest @ ..] => self.manufacturer_data.push(ManufacturerData {
                    company_id: u16::from_le_bytes([*lo, *hi]),
                    data: rest.to_vec(),
                }),
                _ => self.malformed(ad_type, data),
            },
        }
    }

    fn malformed(&mut self, ad_type: u8, data: &[u8]) {
        warn!(ad_type, len = data.len(), "malformed AD structure kept as raw data");
        self.warnings.push(ParseWarning::MalformedStructure {
            ad_type,
            len: data.len(),
        });
        self.push_section(ad_type, data);
    }

    fn push_section(&mut self, ad_type: u8, data: &[u8]) {
        self.data_sections.push(DataSection {
            ad_type,
            data: data.to_vec(),
        });
    }

    /// Encodes the record as AD structures.
    ///
    /// Structures are written in the order flags, service UUIDs, local name, manufacturer data, data sections.
    /// Consecutive service UUIDs of the same width share complete-list structures, split as needed to fit. A name,
    /// manufacturer block or data section has no such split and fails with [`EncodeError::FieldTooLong`] when its
    /// data exceeds 254 octets. Warnings are not encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();

        if let Some(flags) = self.flags {
            write_structure(&mut out, AdType::Flags as u8, &[flags.bits()])?;
        }

        for (width, run) in uuid_runs(&self.services) {
            let (ad_type, per_structure) = match width {
                UuidWidth::Bits16 => (AdType::CompleteServices16, MAX_DATA_LEN / 2),
                UuidWidth::Bits128 => (AdType::CompleteServices128, MAX_DATA_LEN / 16),
            };
            for chunk in run.chunks(per_structure) {
                let data: Vec<u8> = chunk.iter().flat_map(|uuid| uuid.to_ad_bytes(width)).collect();
                write_structure(&mut out, ad_type as u8, &data)?;
            }
        }

        if let Some(name) = &self.local_name {
            write_structure(&mut out, AdType::CompleteLocalName as u8, name.as_bytes())?;
        }

        for mfg in &self.manufacturer_data {
            let mut data = mfg.company_id.to_le_bytes().to_vec();
            data.extend_from_slice(&mfg.data);
            write_structure(&mut out, AdType::ManufacturerSpecificData as u8, &data)?;
        }

        for section in &self.data_sections {
            write_structure(&mut out, section.ad_type, &section.data)?;
        }

        Ok(out)
    }
}

const MAX_DATA_LEN: usize = u8::MAX as usize - 1;

fn write_structure(out: &mut Vec<u8>, ad_type: u8, data: &[u8]) -> Result<(), EncodeError> {
    if data.len() > MAX_DATA_LEN {
        return Err(EncodeError::FieldTooLong {
            ad_type,
            len: data.len(),
        });
    }
    // bounded by MAX_DATA_LEN
    out.push((data.len() + 1) as u8);
    out.push(ad_type);
    out.extend_from_slice(data);
    Ok(())
}

fn uuid_runs(services: &[Uuid]) -> Vec<(UuidWidth, &[Uuid])> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=services.len() {
        if i == services.len() || services[i].ad_width() != services[start].ad_width() {
            runs.push((services[start].ad_width(), &services[start..i]));
            start = i;
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btuuid::bluetooth_uuid_from_u16;

    fn hex(s: &str) -> Vec<u8> {
        crate::hexcodec::decode(s).unwrap()
    }

    #[test]
    fn flags_and_16_bit_service() {
        let record = parse(&hex("020106 0303AAFE")).unwrap();
        assert_eq!(record.flags, Some(AdvertisementFlags::from_bits(0x06)));
        assert_eq!(record.services, vec![bluetooth_uuid_from_u16(0xFEAA)]);
        assert_eq!(record.local_name, None);
        assert!(record.manufacturer_data.is_empty());
        assert!(record.data_sections.is_empty());
    }

    #[test]
    fn manufacturer_data_block() {
        let record = parse(&hex("05FF4C000215")).unwrap();
        assert_eq!(
            record.manufacturer_data,
            vec![ManufacturerData {
                company_id: 0x004C,
                data: vec![0x02, 0x15],
            }]
        );
    }

    #[test]
    fn empty_payload_is_empty_record() {
        let record = parse(&[]).unwrap();
        assert!(record.is_empty());
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn truncated_final_structure_keeps_prefix() {
        let err = parse(&hex("020106 0509414243")).unwrap_err();
        assert_eq!(
            err.kind(),
            ParseErrorKind::TruncatedStructure {
                declared: 5,
                available: 4,
            }
        );
        assert_eq!(err.offset(), 3);
        let partial = err.into_partial();
        assert_eq!(partial.flags, Some(AdvertisementFlags::from_bits(0x06)));
        assert_eq!(partial.local_name, None);
    }

    #[test]
    fn invalid_utf8_name_is_a_warning() {
        let record = parse(&hex("0309FFFE 020106")).unwrap();
        assert_eq!(record.local_name, None);
        assert_eq!(record.warnings, vec![ParseWarning::TextDecode { ad_type: 0x09 }]);
        assert_eq!(record.flags, Some(AdvertisementFlags::from_bits(0x06)));
    }

    #[test]
    fn later_flags_overwrite_earlier() {
        let record = parse(&hex("020106 020102")).unwrap();
        assert_eq!(record.flags, Some(AdvertisementFlags::from_bits(0x02)));
    }

    #[test]
    fn ragged_uuid_list_is_kept_raw() {
        let record = parse(&hex("040312 1834")).unwrap();
        assert!(record.services.is_empty());
        assert_eq!(
            record.data_sections,
            vec![DataSection {
                ad_type: 0x03,
                data: vec![0x12, 0x18, 0x34],
            }]
        );
        assert_eq!(
            record.warnings,
            vec![ParseWarning::MalformedStructure { ad_type: 0x03, len: 3 }]
        );
    }

    #[test]
    fn unknown_types_become_data_sections() {
        let record = parse(&hex("020AF4 03161A18")).unwrap();
        assert_eq!(
            record.data_sections,
            vec![
                DataSection {
                    ad_type: 0x0A,
                    data: vec![0xF4],
                },
                DataSection {
                    ad_type: 0x16,
                    data: vec![0x1A, 0x18],
                },
            ]
        );
    }

    #[test]
    fn structures_cover_every_byte() {
        let payload = hex("020106 0303AAFE 0509414243 05FF4C000215 020AF4");
        let consumed: usize = AdStructures::new(&payload)
            .map(|s| s.map(|s| s.data.len() + 2).unwrap_or(0))
            .sum();
        assert_eq!(consumed, payload.len());
    }

    #[test]
    fn zero_length_padding_is_skipped() {
        let record = parse(&hex("020106 0000")).unwrap();
        assert_eq!(record.flags, Some(AdvertisementFlags::from_bits(0x06)));
        assert!(record.data_sections.is_empty());
    }

    #[test]
    fn encoding_reparses_to_equal_record() {
        let record = AdvertisementRecord {
            local_name: Some("Flic 2".into()),
            services: vec![
                bluetooth_uuid_from_u16(0x180F),
                bluetooth_uuid_from_u16(0x180A),
                Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e),
                bluetooth_uuid_from_u16(0x180F),
            ],
            flags: Some(AdvertisementFlags::from_bits(0x1A)),
            manufacturer_data: vec![ManufacturerData {
                company_id: 0x0006,
                data: vec![0x01, 0x09, 0x20],
            }],
            data_sections: vec![DataSection {
                ad_type: 0x16,
                data: vec![0xAA, 0xFE, 0x10],
            }],
            warnings: Vec::new(),
        };

        assert_eq!(parse(&record.to_bytes().unwrap()).unwrap(), record);
    }

    #[test]
    fn long_uuid_lists_are_split() {
        let services: Vec<Uuid> = (0..200u16).map(bluetooth_uuid_from_u16).collect();
        let record = AdvertisementRecord {
            services,
            ..Default::default()
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(bytes[0], 255);
        assert_eq!(parse(&bytes).unwrap(), record);
    }

    #[test]
    fn incomplete_16_bit_list() {
        let record = parse(&hex("05020F180A18")).unwrap();
        assert_eq!(
            record.services,
            vec![bluetooth_uuid_from_u16(0x180F), bluetooth_uuid_from_u16(0x180A)]
        );
        assert!(record.data_sections.is_empty());
    }

    #[test]
    fn incomplete_128_bit_list_is_little_endian() {
        let record = parse(&hex("1106 9ECADC240EE5A9E093F3A3B50100406E")).unwrap();
        assert_eq!(
            record.services,
            vec![Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e)]
        );
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn shortened_local_name() {
        let record = parse(&hex("0508466C6963")).unwrap();
        assert_eq!(record.local_name.as_deref(), Some("Flic"));
        assert!(record.data_sections.is_empty());
    }

    #[test]
    fn oversized_name_is_rejected() {
        let record = AdvertisementRecord {
            local_name: Some("x".repeat(300)),
            ..Default::default()
        };
        assert_eq!(
            record.to_bytes(),
            Err(EncodeError::FieldTooLong { ad_type: 0x09, len: 300 })
        );
    }

    #[test]
    fn oversized_manufacturer_data_is_rejected() {
        let record = AdvertisementRecord {
            manufacturer_data: vec![ManufacturerData {
                company_id: 0x004C,
                data: vec![0xAB; 300],
            }],
            ..Default::default()
        };
        assert_eq!(
            record.to_bytes(),
            Err(EncodeError::FieldTooLong { ad_type: 0xFF, len: 302 })
        );
    }

    #[test]
    fn oversized_data_section_is_rejected() {
        let record = AdvertisementRecord {
            data_sections: vec![DataSection {
                ad_type: 0x16,
                data: vec![0; 255],
            }],
            ..Default::default()
        };
        assert_eq!(
            record.to_bytes(),
            Err(EncodeError::FieldTooLong { ad_type: 0x16, len: 255 })
        );
    }

    #[test]
    fn largest_fields_still_round_trip() {
        let record = AdvertisementRecord {
            local_name: Some("é".repeat(127)),
            manufacturer_data: vec![ManufacturerData {
                company_id: 0x004C,
                data: vec![0xAB; 252],
            }],
            data_sections: vec![DataSection {
                ad_type: 0x16,
                data: vec![0x5A; 254],
            }],
            ..Default::default()
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(parse(&bytes).unwrap(), record);
    }
}
