use crate::layout;
use crate::{Error, Result};

pub struct Utils;
impl Utils {
    /// Parses an address or size: `0x`, `0b`, `0o` prefixes or decimal, with an
    /// optional binary `k`/`m` suffix. Flash size classes like `8M` resolve
    /// through the fixed size table.
    pub fn str_to_u32(s: &str) -> Result<u32> {
        let s = s.trim();
        if let Some(bytes) = layout::size_to_bytes(&s.to_ascii_uppercase()) {
            return Ok(bytes);
        }

        let invalid = |e: std::num::ParseIntError| Error::invalid_input(format!("'{}': {}", s, e));

        let (num_str, multiplier) = match s.chars().last() {
            Some('k') | Some('K') => (&s[..s.len() - 1], 1024u32),
            Some('m') | Some('M') => (&s[..s.len() - 1], 1024 * 1024),
            _ => (s, 1),
        };

        let unsigned: u32 = if let Some(hex) = num_str
            .strip_prefix("0x")
            .or_else(|| num_str.strip_prefix("0X"))
        {
            u32::from_str_radix(hex, 16).map_err(invalid)?
        } else if let Some(bin) = num_str.strip_prefix("0b") {
            u32::from_str_radix(bin, 2).map_err(invalid)?
        } else if let Some(oct) = num_str.strip_prefix("0o") {
            u32::from_str_radix(oct, 8).map_err(invalid)?
        } else {
            num_str.parse().map_err(invalid)?
        };

        unsigned
            .checked_mul(multiplier)
            .ok_or_else(|| Error::invalid_input(format!("'{}' does not fit in 32 bits", s)))
    }

    /// Parses a flash address. Addresses are always hexadecimal; the `0x`
    /// prefix is optional, so `08000000` is `0x08000000`.
    pub fn parse_address(s: &str) -> Result<u32> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u32::from_str_radix(digits, 16)
            .map_err(|e| Error::invalid_input(format!("address '{}': {}", s, e)))
    }

    /// `8388608` -> `8,388,608`
    pub fn group_thousands(value: u64) -> String {
        let digits = value.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }
}
