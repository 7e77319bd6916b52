//! Alternate-script linkage (MARC 880) support.
//!
//! An 880 field carries an alternate graphical representation (original
//! script or romanization) of data that appears in another field. The link
//! is established through subfield 6, whose value names the tag of the
//! counterpart field plus an occurrence number, optionally followed by a
//! script identification code and an orientation flag:
//!
//! ```text
//! 245: $6 880-01 $a Romanized title
//! 880: $6 245-01/(2/r $a <original script title>
//! ```
//!
//! The extractor only needs the linked *tag* — an 880 whose `$6` begins
//! `245-…` is treated as a 245 for spec matching. [`linked_tag_of`] performs
//! that recovery, degrading gracefully on malformed values.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // TAG-OCC[/SCRIPT][/r]; SCRIPT is parenthesized ((2 Hebrew, (3 Arabic,
    // (B Latin, (N Cyrillic, (S Greek) or dollar-sign ($1 CJK).
    static ref LINKAGE: Regex =
        Regex::new(r"\A(\d{3})-(\d{2,3})(?:/([\(\$][A-Za-z0-9]))?(?:/r)?\z").unwrap();
}

/// Information parsed from a subfield 6 (Linkage) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageInfo {
    /// The 3-digit tag of the linked counterpart field.
    pub tag: String,
    /// Occurrence number (01-999) pairing the two fields.
    pub occurrence: String,
    /// Script identification code, empty when absent.
    pub script_id: String,
    /// Whether the right-to-left orientation flag (`/r`) is set.
    pub is_reverse: bool,
}

impl LinkageInfo {
    /// Parse a subfield 6 value.
    ///
    /// Returns `None` when the value does not match the
    /// `TAG-OCC[/SCRIPT][/r]` format.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let caps = LINKAGE.captures(value)?;
        Some(LinkageInfo {
            tag: caps[1].to_string(),
            occurrence: caps[2].to_string(),
            script_id: caps
                .get(3)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            is_reverse: value.ends_with("/r"),
        })
    }
}

/// Recover the linked tag from a subfield 6 value.
///
/// Strictly-formatted values are parsed as [`LinkageInfo`]; values that are
/// malformed but still start with a plausible 3-character tag fall back to
/// that prefix, matching the lenient behavior real-world data requires.
/// Returns `None` only when not even a 3-character prefix is available.
#[must_use]
pub fn linked_tag_of(subfield6: &str) -> Option<String> {
    if let Some(info) = LinkageInfo::parse(subfield6) {
        return Some(info.tag);
    }
    let prefix: String = subfield6.chars().take(3).collect();
    if prefix.chars().count() == 3 {
        Some(prefix)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // Strict parsing
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_basic_linkage() {
        let info = LinkageInfo::parse("245-01").unwrap();
        assert_eq!(info.tag, "245");
        assert_eq!(info.occurrence, "01");
        assert_eq!(info.script_id, "");
        assert!(!info.is_reverse);
    }

    #[test]
    fn test_parse_with_script_and_reverse() {
        let info = LinkageInfo::parse("245-01/(2/r").unwrap();
        assert_eq!(info.tag, "245");
        assert_eq!(info.script_id, "(2");
        assert!(info.is_reverse);
    }

    #[test]
    fn test_parse_cjk_script_code() {
        let info = LinkageInfo::parse("880-02/$1").unwrap();
        assert_eq!(info.tag, "880");
        assert_eq!(info.script_id, "$1");
        assert!(!info.is_reverse);
    }

    #[test]
    fn test_parse_three_digit_occurrence() {
        let info = LinkageInfo::parse("100-001").unwrap();
        assert_eq!(info.occurrence, "001");
    }

    #[test]
    fn test_parse_invalid_formats() {
        assert!(LinkageInfo::parse("10001").is_none());
        assert!(LinkageInfo::parse("10-01").is_none());
        assert!(LinkageInfo::parse("100-1").is_none());
        assert!(LinkageInfo::parse("100-").is_none());
        assert!(LinkageInfo::parse("").is_none());
    }

    // ------------------------------------------------------------------
    // Lenient tag recovery
    // ------------------------------------------------------------------

    #[test]
    fn test_linked_tag_of_strict_value() {
        assert_eq!(linked_tag_of("245-01"), Some("245".to_string()));
        assert_eq!(linked_tag_of("245-01/(3/r"), Some("245".to_string()));
    }

    #[test]
    fn test_linked_tag_of_malformed_value_uses_prefix() {
        // Occurrence missing, but the tag prefix is still recoverable.
        assert_eq!(linked_tag_of("245-"), Some("245".to_string()));
        assert_eq!(linked_tag_of("245x01"), Some("245".to_string()));
    }

    #[test]
    fn test_linked_tag_of_too_short() {
        assert_eq!(linked_tag_of("24"), None);
        assert_eq!(linked_tag_of(""), None);
    }
}
