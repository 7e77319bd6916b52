//! The field specification mini-language.
//!
//! A spec string describes which fields, subfields, indicators, or byte
//! positions to extract from a record. Specs are colon-separated; each unit
//! is one of:
//!
//! - **Data-field form**: `TAG[|I1I2|]SUBFIELDS?` — a 3-character tag, an
//!   optional pipe-delimited indicator block of exactly two characters
//!   (`*` means "no constraint"), and zero or more subfield codes. No codes
//!   means "all subfields".
//! - **Control-field form**: `TAG[N]` or `TAG[N-M]` — a byte offset or an
//!   inclusive byte range into a fixed field's value. The tag `LDR`
//!   addresses the record leader.
//!
//! # Examples
//!
//! ```ignore
//! use marcdex::SpecSet;
//!
//! let specs = SpecSet::parse("245abcd")?;          // subfields a,b,c,d of 245
//! let specs = SpecSet::parse("100:110:111")?;      // all subfields, three tags
//! let specs = SpecSet::parse("700|*4|bcd")?;       // any ind1, ind2 = '4'
//! let specs = SpecSet::parse("008[35-37]")?;       // bytes 35..=37 of 008
//! # Ok::<(), marcdex::IndexerError>(())
//! ```
//!
//! Repeating a single subfield code (`020aa`) is meaningful: it forces the
//! joined (one entry per field occurrence) behavior that a single unrepeated
//! code would otherwise opt out of.

use crate::error::{IndexerError, Result};
use crate::record::Field;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DATA_SPEC: Regex =
        Regex::new(r"\A([a-zA-Z0-9]{3})(?:\|([a-z0-9 \*]{2})\|)?([a-z0-9]*)\z").unwrap();
    static ref CONTROL_SPEC: Regex =
        Regex::new(r"\A([a-zA-Z0-9]{3})\[(\d+)(?:-(\d+))?\]\z").unwrap();
}

/// A byte offset or inclusive byte range into a fixed field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteSpan {
    /// A single byte position.
    Single(usize),
    /// An inclusive byte range (start, end).
    Range(usize, usize),
}

impl ByteSpan {
    /// Slice the given value at this span, byte-wise.
    ///
    /// Fixed-field positions are defined on bytes, so this deliberately
    /// slices bytes rather than characters. Out-of-range spans yield `None`
    /// instead of panicking; a span that splits a multi-byte character is
    /// replaced lossily.
    #[must_use]
    pub fn slice(&self, value: &str) -> Option<String> {
        let bytes = value.as_bytes();
        let slice = match *self {
            ByteSpan::Single(offset) => bytes.get(offset..=offset)?,
            ByteSpan::Range(start, end) => bytes.get(start..=end)?,
        };
        Some(String::from_utf8_lossy(slice).into_owned())
    }
}

/// A single parsed extraction instruction.
///
/// A spec is either a *data-field* spec (indicators and subfields
/// meaningful, `bytes` is `None`) or a *control-field* spec (`bytes`
/// populated, indicators and subfields unused). Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// 3-character field tag (`LDR` addresses the leader).
    pub tag: String,
    /// First indicator constraint. `None` matches any indicator.
    pub indicator1: Option<char>,
    /// Second indicator constraint. `None` matches any indicator.
    pub indicator2: Option<char>,
    /// Ordered subfield codes to extract. `None` means all subfields.
    /// Repetition is allowed and meaningful for the join rule.
    pub subfields: Option<Vec<char>>,
    /// Byte addressing for control/leader specs.
    pub bytes: Option<ByteSpan>,
}

impl FieldSpec {
    /// Parse one spec unit (no colons).
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::InvalidSpecification`] naming the offending
    /// unit when it matches neither the data-field nor control-field form.
    pub fn parse(unit: &str) -> Result<Self> {
        if let Some(caps) = CONTROL_SPEC.captures(unit) {
            let start: usize = caps[2].parse().map_err(|_| invalid(unit))?;
            let bytes = match caps.get(3) {
                Some(end) => {
                    let end: usize = end.as_str().parse().map_err(|_| invalid(unit))?;
                    if end < start {
                        return Err(invalid(unit));
                    }
                    ByteSpan::Range(start, end)
                }
                None => ByteSpan::Single(start),
            };
            return Ok(FieldSpec {
                tag: caps[1].to_string(),
                indicator1: None,
                indicator2: None,
                subfields: None,
                bytes: Some(bytes),
            });
        }

        if let Some(caps) = DATA_SPEC.captures(unit) {
            let (indicator1, indicator2) = match caps.get(2) {
                Some(block) => {
                    let mut chars = block.as_str().chars();
                    // The regex guarantees exactly two characters.
                    let i1 = chars.next().unwrap();
                    let i2 = chars.next().unwrap();
                    (constraint(i1), constraint(i2))
                }
                None => (None, None),
            };
            let codes: Vec<char> = caps[3].chars().collect();
            return Ok(FieldSpec {
                tag: caps[1].to_string(),
                indicator1,
                indicator2,
                subfields: if codes.is_empty() { None } else { Some(codes) },
                bytes: None,
            });
        }

        Err(invalid(unit))
    }

    /// Whether this is a control-field (byte-addressed) spec.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.bytes.is_some()
    }

    /// Whether this spec addresses the record leader.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.tag == "LDR"
    }

    /// Whether a field's indicators satisfy this spec's constraints.
    ///
    /// A `None` constraint always matches; otherwise the indicator must
    /// match exactly.
    #[must_use]
    pub fn matches_indicators(&self, field: &Field) -> bool {
        if let Some(ind1) = self.indicator1 {
            if field.indicator1 != ind1 {
                return false;
            }
        }
        if let Some(ind2) = self.indicator2 {
            if field.indicator2 != ind2 {
                return false;
            }
        }
        true
    }

    /// Whether collected subfield values are joined into one entry per
    /// field occurrence.
    ///
    /// A single unrepeated subfield code opts out of joining (each matching
    /// subfield becomes its own entry). Zero codes ("all subfields"), two
    /// or more codes, or one code deliberately repeated all join.
    #[must_use]
    pub fn joinable(&self) -> bool {
        !matches!(&self.subfields, Some(codes) if codes.len() == 1)
    }
}

fn constraint(c: char) -> Option<char> {
    if c == '*' {
        None
    } else {
        Some(c)
    }
}

fn invalid(unit: &str) -> IndexerError {
    IndexerError::InvalidSpecification(unit.to_string())
}

/// An immutable set of parsed specs, keyed by tag in declaration order.
///
/// Multiple specs per tag accumulate (e.g. `"245a:245bc"`), and their
/// declaration order determines output ordering when both match the same
/// field. A `SpecSet` never changes after construction and is safe to share
/// across threads and cache alongside an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSet {
    specs: IndexMap<String, Vec<FieldSpec>>,
}

impl SpecSet {
    /// Parse a colon-separated spec string.
    ///
    /// # Errors
    ///
    /// Fails with [`IndexerError::InvalidSpecification`] on the first unit
    /// that matches neither grammar form.
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_specs(input.split(':'))
    }

    /// Build a spec set from individual spec units.
    ///
    /// # Errors
    ///
    /// Fails with [`IndexerError::InvalidSpecification`] on the first
    /// invalid unit.
    pub fn from_specs<'a>(units: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut specs: IndexMap<String, Vec<FieldSpec>> = IndexMap::new();
        for unit in units {
            let spec = FieldSpec::parse(unit)?;
            specs.entry(spec.tag.clone()).or_default().push(spec);
        }
        Ok(SpecSet { specs })
    }

    /// All tags with at least one spec, in declaration order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Specs registered for a tag, in declaration order.
    #[must_use]
    pub fn specs_for(&self, tag: &str) -> Option<&[FieldSpec]> {
        self.specs.get(tag).map(Vec::as_slice)
    }

    /// Whether any spec addresses the given tag.
    #[must_use]
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.specs.contains_key(tag)
    }

    /// Total number of parsed specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.values().map(Vec::len).sum()
    }

    /// Whether the set holds no specs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
