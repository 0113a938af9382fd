//! `Uuid` extensions for Bluetooth UUIDs as they appear in advertising data

use uuid::Uuid;

/// This is the Bluetooth Base UUID. It is used with 16-bit and 32-bit UUIDs
/// [defined](https://www.bluetooth.com/specifications/assigned-numbers/) by the Bluetooth SIG.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Const function to create a 16-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u16(uuid: u16) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Const function to create a 32-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u32(uuid: u32) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Width of a UUID list carried in an AD structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UuidWidth {
    /// 2 octets, expanded against the Bluetooth Base UUID
    Bits16,
    /// 16 octets, carried in full
    Bits128,
}

impl UuidWidth {
    /// Number of octets a UUID of this width occupies on air.
    pub const fn len(self) -> usize {
        match self {
            UuidWidth::Bits16 => 2,
            UuidWidth::Bits128 => 16,
        }
    }
}

/// Extension trait for [uuid::Uuid] with helpers for the little-endian byte order used by AD structures
/// (Core Specification Supplement, Part A, §1.1).
pub trait BluetoothUuidExt: private::Sealed {
    /// Creates a 16-bit Bluetooth UUID
    fn from_u16(uuid: u16) -> Self;

    /// Creates a 32-bit Bluetooth UUID
    fn from_u32(uuid: u32) -> Self;

    /// Decodes a UUID from little-endian advertising bytes.
    ///
    /// Returns `None` if `bytes.len()` is not one of 2, 4, or 16.
    fn from_ad_bytes(bytes: &[u8]) -> Option<Self>
    where
        Self: Sized;

    /// Returns `true` if self is a valid 16-bit Bluetooth UUID
    fn is_u16_uuid(&self) -> bool;

    /// Tries to convert self into a 16-bit Bluetooth UUID
    fn try_to_u16(&self) -> Option<u16>;

    /// The narrowest width this UUID can be advertised with.
    fn ad_width(&self) -> UuidWidth;

    /// Encodes self in little-endian advertising byte order at the given width.
    ///
    /// A UUID that does not fit in `width` is always encoded in full.
    fn to_ad_bytes(&self, width: UuidWidth) -> Vec<u8>;
}

impl BluetoothUuidExt for Uuid {
    fn from_u16(uuid: u16) -> Self {
        bluetooth_uuid_from_u16(uuid)
    }

    fn from_u32(uuid: u32) -> Self {
        bluetooth_uuid_from_u32(uuid)
    }

    fn from_ad_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            2 => Some(Self::from_u16(u16::from_le_bytes([bytes[0], bytes[1]]))),
            4 => Some(Self::from_u32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))),
            16 => {
                let mut be = [0u8; 16];
                be.copy_from_slice(bytes);
                be.reverse();
                Some(Self::from_bytes(be))
            }
            _ => None,
        }
    }

    fn is_u16_uuid(&self) -> bool {
        let u = self.as_u128();
        (u & ((1 << 96) - 1)) == BLUETOOTH_BASE_UUID && (((u >> 96) as u32) & 0xffff0000) == 0
    }

    fn try_to_u16(&self) -> Option<u16> {
        let u = self.as_u128();
        self.is_u16_uuid().then(|| (u >> 96) as u16)
    }

    fn ad_width(&self) -> UuidWidth {
        if self.is_u16_uuid() {
            UuidWidth::Bits16
        } else {
            UuidWidth::Bits128
        }
    }

    fn to_ad_bytes(&self, width: UuidWidth) -> Vec<u8> {
        match (width, self.try_to_u16()) {
            (UuidWidth::Bits16, Some(short)) => short.to_le_bytes().to_vec(),
            _ => {
                let mut le = *self.as_bytes();
                le.reverse();
                le.to_vec()
            }
        }
    }
}

mod private {
    use uuid::Uuid;

    pub trait Sealed {}

    impl Sealed for Uuid {}
}
