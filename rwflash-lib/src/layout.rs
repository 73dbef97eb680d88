//! Fixed memory layout of the RW61x external QSPI flash.

use phf::phf_ordered_map;

/// Largest region a single `flash-erase-region` call is allowed to cover.
pub const MAX_ERASE_BLOCK: u32 = 0x10_0000;

/// Read size used when the caller does not give one.
pub const DEFAULT_READ_SIZE: u32 = 0x200;

/// Named size classes of the supported QSPI parts. The byte count of a
/// geometry always comes from this table, never from the FCB blob.
pub static FLASH_SIZE_MAPPING: phf::OrderedMap<&'static str, u32> = phf_ordered_map! {
    "4M" => 0x40_0000,
    "8M" => 0x80_0000,
    "16M" => 0x100_0000,
    "32M" => 0x200_0000,
    "64M" => 0x400_0000,
};

/// An address window onto the external flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    pub key: &'static str,
    pub name: &'static str,
    /// Base used for erase and write.
    pub start_addr: u32,
    /// Default probe address for reads.
    pub read_addr: u32,
}

/// Non-secure and secure aliases of the same physical flash. The first entry
/// is the default region.
pub static FLASH_REGIONS: [FlashRegion; 2] = [
    FlashRegion {
        key: "NS",
        name: "External QSPI flash (NS)",
        start_addr: 0x0800_0000,
        read_addr: 0x0800_0400,
    },
    FlashRegion {
        key: "S",
        name: "External QSPI flash (S)",
        start_addr: 0x1800_0000,
        read_addr: 0x1800_0400,
    },
];

/// Byte count of a named size class.
pub fn size_to_bytes(name: &str) -> Option<u32> {
    FLASH_SIZE_MAPPING.get(name).copied()
}

/// Reverse lookup of [`FLASH_SIZE_MAPPING`].
pub fn bytes_to_size(bytes: u32) -> Option<&'static str> {
    FLASH_SIZE_MAPPING
        .entries()
        .find(|(_, value)| **value == bytes)
        .map(|(name, _)| *name)
}

pub fn region(key: &str) -> Option<&'static FlashRegion> {
    FLASH_REGIONS
        .iter()
        .find(|region| region.key.eq_ignore_ascii_case(key))
}

pub fn default_region() -> &'static FlashRegion {
    &FLASH_REGIONS[0]
}

/// All regions in declaration order.
pub fn regions() -> impl Iterator<Item = &'static FlashRegion> {
    FLASH_REGIONS.iter()
}
