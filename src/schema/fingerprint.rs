//! Schema content fingerprints.
//!
//! A change-detection signal, not a security control:
//!
//! - input: compact JSON of the table mapping (sorted keys, fields in
//!   declaration order, absent optional attributes omitted)
//! - algorithm: 32-bit `h = h * 31 + unit` over UTF-16 code units, wrapping
//! - output: 8 lowercase hex digits of the unsigned value
//!
//! Two snapshots with the same tables and columns share a fingerprint no matter
//! in which order the tables were inserted.

use std::collections::BTreeMap;

use super::types::{TableDef, Tables};

/// Fingerprint of a table mapping.
///
/// ```
/// use schema_guard::schema::{TableDef, Tables, fingerprint};
///
/// let mut a = Tables::new();
/// a.insert("users".into(), TableDef::with_columns(["id"]));
/// a.insert("orders".into(), TableDef::with_columns(["id", "user_id"]));
///
/// let mut b = Tables::new();
/// b.insert("orders".into(), TableDef::with_columns(["id", "user_id"]));
/// b.insert("users".into(), TableDef::with_columns(["id"]));
///
/// assert_eq!(fingerprint(&a), fingerprint(&b));
/// assert_eq!(fingerprint(&a).len(), 8);
/// ```
pub fn fingerprint(tables: &Tables) -> String {
    checksum(&canonical_json(tables))
}

/// Canonical serialization hashed by [`fingerprint`]
pub fn canonical_json(tables: &Tables) -> String {
    let sorted: BTreeMap<&str, &TableDef> = tables
        .iter()
        .map(|(name, table)| (name.as_str(), table))
        .collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// 32-bit rolling hash of `input` as fixed-width hex
pub fn checksum(input: &str) -> String {
    let hash = input.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5)
            .wrapping_sub(h)
            .wrapping_add(i32::from(unit))
    });
    format!("{:08x}", hash as u32)
}

#[cfg(test)]
mod tests {
    use super::checksum;

    #[test]
    fn known_values() {
        assert_eq!(checksum(""), "00000000");
        assert_eq!(checksum("a"), "00000061");
        assert_eq!(checksum("ab"), "00000c21");
    }

    #[test]
    fn wraps_into_unsigned_hex() {
        let long = "x".repeat(64);
        let value = checksum(&long);
        assert_eq!(value.len(), 8);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn counts_utf16_units() {
        // U+1F600 is a surrogate pair: 0xD83D, 0xDE00
        let expected = 0xD83Di32.wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(checksum("\u{1F600}"), format!("{:08x}", expected as u32));
    }
}
