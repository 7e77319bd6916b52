//! MARC source record structures consumed by the mapping engine.
//!
//! This module provides the input-side record types:
//! - [`Record`] — a structured bibliographic record
//! - [`Field`] — variable data fields (010+)
//! - [`Subfield`] — named data elements within fields
//!
//! Records are produced by a [`crate::reader::RecordSource`] and are
//! read-only to the engine: the extractor and step pipeline borrow them for
//! the duration of one record's mapping and never mutate them.
//!
//! Data fields are stored in a flat vector preserving record order, because
//! extraction output order is defined as record field order. Control fields
//! (000–009) keep insertion order in an `IndexMap`.
//!
//! # Examples
//!
//! ```ignore
//! use marcdex::{Record, Field};
//!
//! let record = Record::builder()
//!     .control_field_str("001", "ocm012345")
//!     .field(
//!         Field::builder("245", '1', '0')
//!             .subfield_str('a', "A title")
//!             .subfield_str('c', "An author")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.control_number(), Some("ocm012345"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A MARC bibliographic source record.
///
/// The leader is kept as its raw character form (possibly empty) so that
/// byte-addressed extraction specs (`LDR[6]`, `LDR[0-4]`) can slice it the
/// same way they slice control fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Raw record leader (normally 24 characters; may be empty).
    pub leader: String,
    /// Control fields (000-009) - tag -> value, preserves insertion order.
    pub control_fields: IndexMap<String, String>,
    /// Data fields (010+) in record order.
    pub fields: Vec<Field>,
}

/// A data field in a MARC record (fields 010 and higher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 characters).
    pub tag: String,
    /// First indicator.
    pub indicator1: char,
    /// Second indicator.
    pub indicator2: char,
    /// Subfields (`SmallVec` avoids allocation for typical fields with 4 or fewer subfields).
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character).
    pub code: char,
    /// Subfield value.
    pub value: String,
}

impl Record {
    /// Create a new, empty record.
    #[must_use]
    pub fn new() -> Self {
        Record::default()
    }

    /// Create a builder for fluently constructing records.
    #[must_use]
    pub fn builder() -> RecordBuilder {
        RecordBuilder {
            record: Record::default(),
        }
    }

    /// Add a control field (000-009).
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// Add a control field using string slices.
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Get a control field value.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// Add a data field, preserving record order.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Iterate over all data fields in record order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate over data fields matching a specific tag, in record order.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    /// Get the first data field with a given tag.
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Iterate over all control fields as (tag, value) tuples.
    pub fn control_fields_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.control_fields
            .iter()
            .map(|(tag, value)| (tag.as_str(), value.as_str()))
    }

    /// Get the control number (system number) from field 001.
    #[must_use]
    pub fn control_number(&self) -> Option<&str> {
        self.get_control_field("001")
    }
}

/// Builder for fluently constructing source records.
///
/// # Examples
///
/// ```ignore
/// let record = Record::builder()
///     .leader("00924njm a2200229 a 4500")
///     .control_field_str("001", "12345")
///     .field(Field::builder("245", '1', '0').subfield_str('a', "Title").build())
///     .build();
/// ```
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Set the raw leader.
    #[must_use]
    pub fn leader(mut self, leader: &str) -> Self {
        self.record.leader = leader.to_string();
        self
    }

    /// Add a control field to the record being built.
    #[must_use]
    pub fn control_field_str(mut self, tag: &str, value: &str) -> Self {
        self.record.add_control_field_str(tag, value);
        self
    }

    /// Add a data field to the record being built.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record.
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

impl Field {
    /// Create a new data field.
    #[must_use]
    pub fn new(tag: impl Into<String>, indicator1: char, indicator2: char) -> Self {
        Field {
            tag: tag.into(),
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for constructing fields fluently.
    #[must_use]
    pub fn builder(tag: impl Into<String>, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Add a subfield.
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice.
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Get first value for a subfield code.
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Iterate over all subfields in field order.
    pub fn subfields(&self) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter()
    }

    /// Iterate over values of subfields with a specific code, in field order.
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Get all subfield values matching any of the given codes, in field order.
    #[must_use]
    pub fn get_subfields(&self, codes: &[char]) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|sf| codes.contains(&sf.code))
            .map(|sf| sf.value.as_str())
            .collect()
    }
}

/// Builder for fluently constructing fields.
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield to the field being built.
    #[must_use]
    pub fn subfield(mut self, code: char, value: String) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Add a subfield using a string slice.
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Build the field.
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record::builder()
            .leader("00924njm a2200229 a 4500")
            .control_field_str("001", "ocm0001")
            .control_field_str("008", "850101s2002    nyu           000 0 eng d")
            .field(
                Field::builder("245", '1', '0')
                    .subfield_str('a', "Manufacturing consent :")
                    .subfield_str('b', "the political economy of the mass media /")
                    .build(),
            )
            .field(
                Field::builder("700", '1', ' ')
                    .subfield_str('a', "Chomsky, Noam.")
                    .build(),
            )
            .field(
                Field::builder("700", '1', ' ')
                    .subfield_str('a', "Herman, Edward S.")
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_control_field_access() {
        let record = sample_record();
        assert_eq!(record.get_control_field("001"), Some("ocm0001"));
        assert_eq!(record.control_number(), Some("ocm0001"));
        assert_eq!(record.get_control_field("005"), None);
    }

    #[test]
    fn test_fields_preserve_record_order() {
        let record = sample_record();
        let tags: Vec<_> = record.fields().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["245", "700", "700"]);
    }

    #[test]
    fn test_fields_by_tag() {
        let record = sample_record();
        let names: Vec<_> = record
            .fields_by_tag("700")
            .filter_map(|f| f.get_subfield('a'))
            .collect();
        assert_eq!(names, vec!["Chomsky, Noam.", "Herman, Edward S."]);
    }

    #[test]
    fn test_get_field_returns_first() {
        let record = sample_record();
        let field = record.get_field("700").unwrap();
        assert_eq!(field.get_subfield('a'), Some("Chomsky, Noam."));
    }

    #[test]
    fn test_repeated_subfields_in_field_order() {
        let mut field = Field::new("020", ' ', ' ');
        field.add_subfield_str('a', "0-13-110362-8");
        field.add_subfield_str('a', "0-13-110370-9");
        field.add_subfield_str('z', "0-13-110999-9");

        let values: Vec<_> = field.subfields_by_code('a').collect();
        assert_eq!(values, vec!["0-13-110362-8", "0-13-110370-9"]);

        let mixed = field.get_subfields(&['a', 'z']);
        assert_eq!(mixed.len(), 3);
        assert_eq!(mixed[2], "0-13-110999-9");
    }

    #[test]
    fn test_serde_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields.len(), 3);
        assert_eq!(back.control_number(), Some("ocm0001"));
    }
}
