//! Field matching and value extraction.
//!
//! [`MarcExtractor`] applies a parsed [`SpecSet`] to a record and returns
//! the matched values as an ordered list of strings. It handles indicator
//! constraints, byte-addressed control/leader fields, alternate-script
//! (880) linkage, and the per-spec join rules.
//!
//! Construction is comparatively expensive (grammar parse, interesting-tag
//! precomputation), extraction is hot. Extractors are therefore immutable
//! after construction, safe to share across threads, and cached per thread
//! via [`MarcExtractor::cached`] — build once, extract for every record.
//!
//! # Examples
//!
//! ```ignore
//! use marcdex::{ExtractorOptions, MarcExtractor};
//!
//! let extractor = MarcExtractor::from_string("245ab", &ExtractorOptions::default())?;
//! let titles = extractor.extract(&record);
//! # Ok::<(), marcdex::IndexerError>(())
//! ```
//!
//! Output order is record field order, then spec declaration order for
//! multiple specs matching one field, then subfield order within the field.
//! The extractor never deduplicates; that is a downstream transformation.

use crate::error::Result;
use crate::field_linkage::linked_tag_of;
use crate::field_spec::{FieldSpec, SpecSet};
use crate::record::{Field, Record};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Tag conventionally carrying alternate graphical representations.
pub const ALTERNATE_SCRIPT_TAG: &str = "880";

/// Subfield code carrying the linkage back to the original field.
pub const LINKAGE_SUBFIELD: char = '6';

/// How alternate-script (880) fields participate in extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlternateScript {
    /// Extract from both original fields and linked 880 fields.
    #[default]
    Include,
    /// Ignore 880 fields entirely.
    Exclude,
    /// Extract from linked 880 fields only; original fields are ignored.
    Only,
}

/// Options controlling extraction behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorOptions {
    /// Separator used when a spec joins subfield values. Default is a
    /// single space.
    pub separator: String,
    /// Alternate-script participation mode.
    pub alternate_script: AlternateScript,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        ExtractorOptions {
            separator: " ".to_string(),
            alternate_script: AlternateScript::Include,
        }
    }
}

impl ExtractorOptions {
    /// Replace the join separator.
    #[must_use]
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    /// Replace the alternate-script mode.
    #[must_use]
    pub fn with_alternate_script(mut self, mode: AlternateScript) -> Self {
        self.alternate_script = mode;
        self
    }
}

type CacheKey = (String, String, AlternateScript);

thread_local! {
    // Per-thread cache; keys are the construction arguments. Thread-local
    // storage avoids synchronization on the hot path while keeping cache
    // population race-free.
    static EXTRACTOR_CACHE: RefCell<HashMap<CacheKey, Arc<MarcExtractor>>> =
        RefCell::new(HashMap::new());
}

/// Matches specs against records and extracts values.
///
/// Immutable after construction; safe for concurrent reuse across records
/// and threads.
#[derive(Debug, Clone)]
pub struct MarcExtractor {
    spec_set: SpecSet,
    separator: String,
    alternate_script: AlternateScript,
    // Tags that could possibly match, including the linkage tag when
    // alternate-script fields participate. Everything else is skipped
    // without spec lookup.
    interesting_tags: HashSet<String>,
}

impl MarcExtractor {
    /// Build an extractor from an already-parsed spec set.
    #[must_use]
    pub fn new(spec_set: SpecSet, options: &ExtractorOptions) -> Self {
        let mut interesting_tags: HashSet<String> =
            spec_set.tags().map(ToString::to_string).collect();
        if options.alternate_script != AlternateScript::Exclude {
            interesting_tags.insert(ALTERNATE_SCRIPT_TAG.to_string());
        }
        MarcExtractor {
            spec_set,
            separator: options.separator.clone(),
            alternate_script: options.alternate_script,
            interesting_tags,
        }
    }

    /// Parse a spec string and build an extractor.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::IndexerError::InvalidSpecification`] on a
    /// malformed spec string.
    pub fn from_string(spec: &str, options: &ExtractorOptions) -> Result<Self> {
        Ok(Self::new(SpecSet::parse(spec)?, options))
    }

    /// Fetch or build a shared extractor for the given construction
    /// arguments.
    ///
    /// The cache is per thread; a cached extractor is never mutated.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::IndexerError::InvalidSpecification`] on a
    /// malformed spec string (malformed specs are not cached).
    pub fn cached(spec: &str, options: &ExtractorOptions) -> Result<Arc<Self>> {
        let key = (
            spec.to_string(),
            options.separator.clone(),
            options.alternate_script,
        );
        EXTRACTOR_CACHE.with(|cache| {
            if let Some(found) = cache.borrow().get(&key) {
                return Ok(Arc::clone(found));
            }
            let built = Arc::new(Self::from_string(spec, options)?);
            cache.borrow_mut().insert(key, Arc::clone(&built));
            Ok(built)
        })
    }

    /// The parsed spec set this extractor applies.
    #[must_use]
    pub fn spec_set(&self) -> &SpecSet {
        &self.spec_set
    }

    /// Extract all matching values from a record.
    ///
    /// Leader spans are evaluated first, then control fields in insertion
    /// order, then data fields in record order — matching the physical
    /// layout of a MARC record.
    #[must_use]
    pub fn extract(&self, record: &Record) -> Vec<String> {
        let mut out = Vec::new();

        if let Some(specs) = self.spec_set.specs_for("LDR") {
            for spec in specs {
                if let Some(span) = spec.bytes {
                    if let Some(value) = span.slice(&record.leader) {
                        out.push(value);
                    }
                }
            }
        }

        for (tag, value) in record.control_fields_iter() {
            if !self.interesting_tags.contains(tag) {
                continue;
            }
            if let Some(specs) = self.spec_set.specs_for(tag) {
                for spec in specs {
                    if let Some(span) = spec.bytes {
                        if let Some(extracted) = span.slice(value) {
                            out.push(extracted);
                        }
                    }
                }
            }
        }

        for field in record.fields() {
            if !self.interesting_tags.contains(field.tag.as_str()) {
                continue;
            }
            for spec in self.specs_covering(field) {
                if !spec.is_control() {
                    self.collect_data_values(field, spec, &mut out);
                }
            }
        }

        out
    }

    /// Determine which specs cover a data field, in spec declaration order.
    ///
    /// An 880 field is matched through its linkage subfield: the recovered
    /// original tag's specs apply, with indicator constraints checked
    /// against the 880 field itself. An 880 without a linkage subfield
    /// degrades to its literal tag. Any other field matches its own tag's
    /// specs — unless the mode is [`AlternateScript::Only`], in which case
    /// original fields are ignored entirely.
    fn specs_covering(&self, field: &Field) -> Vec<&FieldSpec> {
        let lookup_tag: Option<String> = if field.tag == ALTERNATE_SCRIPT_TAG {
            if self.alternate_script == AlternateScript::Exclude {
                None
            } else {
                Some(
                    field
                        .get_subfield(LINKAGE_SUBFIELD)
                        .and_then(linked_tag_of)
                        .unwrap_or_else(|| field.tag.clone()),
                )
            }
        } else if self.alternate_script == AlternateScript::Only {
            None
        } else {
            Some(field.tag.clone())
        };

        match lookup_tag.and_then(|tag| self.spec_set.specs_for(&tag)) {
            Some(specs) => specs
                .iter()
                .filter(|spec| spec.matches_indicators(field))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Collect subfield values for one (field, spec) pair, applying the
    /// join rule.
    fn collect_data_values(&self, field: &Field, spec: &FieldSpec, out: &mut Vec<String>) {
        let values: Vec<&str> = match &spec.subfields {
            None => field.subfields().map(|sf| sf.value.as_str()).collect(),
            Some(codes) => field
                .subfields()
                .filter(|sf| codes.contains(&sf.code))
                .map(|sf| sf.value.as_str())
                .collect(),
        };
        if values.is_empty() {
            return;
        }
        if spec.joinable() {
            out.push(values.join(&self.separator));
        } else {
            out.extend(values.into_iter().map(ToString::to_string));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn extractor(spec: &str) -> MarcExtractor {
        MarcExtractor::from_string(spec, &ExtractorOptions::default()).unwrap()
    }

    fn isbn_record() -> Record {
        let mut record = Record::new();
        let mut field = Field::new("020", ' ', ' ');
        field.add_subfield_str('a', "0-13-110362-8");
        field.add_subfield_str('a', "0-13-110370-9");
        field.add_subfield_str('z', "0-13-110999-9");
        record.add_field(field);
        record
    }

    // ------------------------------------------------------------------
    // Join rules
    // ------------------------------------------------------------------

    #[test]
    fn test_single_subfield_specs_do_not_join() {
        // Two single-subfield specs against two $a and one $z: three
        // separate entries, field order.
        let values = extractor("020a:020z").extract(&isbn_record());
        assert_eq!(
            values,
            vec!["0-13-110362-8", "0-13-110370-9", "0-13-110999-9"]
        );
    }

    #[test]
    fn test_repeated_subfield_code_forces_join() {
        let values = extractor("020aa").extract(&isbn_record());
        assert_eq!(values, vec!["0-13-110362-8 0-13-110370-9"]);
    }

    #[test]
    fn test_multiple_codes_join_per_field_occurrence() {
        let values = extractor("020az").extract(&isbn_record());
        assert_eq!(values, vec!["0-13-110362-8 0-13-110370-9 0-13-110999-9"]);
    }

    #[test]
    fn test_no_codes_means_all_subfields_joined() {
        let values = extractor("020").extract(&isbn_record());
        assert_eq!(values, vec!["0-13-110362-8 0-13-110370-9 0-13-110999-9"]);
    }

    #[test]
    fn test_custom_separator() {
        let options = ExtractorOptions::default().with_separator("; ");
        let ex = MarcExtractor::from_string("020aa", &options).unwrap();
        assert_eq!(ex.extract(&isbn_record()), vec!["0-13-110362-8; 0-13-110370-9"]);
    }

    #[test]
    fn test_join_happens_per_occurrence_not_per_spec() {
        let mut record = Record::new();
        for title in ["First note", "Second note"] {
            let mut field = Field::new("500", ' ', ' ');
            field.add_subfield_str('a', title);
            field.add_subfield_str('b', "x");
            record.add_field(field);
        }
        let values = extractor("500ab").extract(&record);
        assert_eq!(values, vec!["First note x", "Second note x"]);
    }

    // ------------------------------------------------------------------
    // Control fields and leader
    // ------------------------------------------------------------------

    #[test]
    fn test_control_field_byte_range() {
        let mut record = Record::new();
        record.add_control_field_str("008", "850101s2002    nyu           000 0 eng d");
        assert_eq!(extractor("008[7-10]").extract(&record), vec!["2002"]);
        assert_eq!(extractor("008[35-37]").extract(&record), vec!["eng"]);
    }

    #[test]
    fn test_control_field_single_byte() {
        let mut record = Record::new();
        record.add_control_field_str("005", "20240101120000.0");
        assert_eq!(extractor("005[5]").extract(&record), vec!["1"]);
    }

    #[test]
    fn test_control_field_out_of_range_yields_nothing() {
        let mut record = Record::new();
        record.add_control_field_str("008", "short");
        assert!(extractor("008[35-37]").extract(&record).is_empty());
    }

    #[test]
    fn test_leader_bytes() {
        let mut record = Record::new();
        record.leader = "00924njm a2200229 a 4500".to_string();
        assert_eq!(extractor("LDR[6]").extract(&record), vec!["j"]);
        assert_eq!(extractor("LDR[5-7]").extract(&record), vec!["njm"]);
    }

    // ------------------------------------------------------------------
    // Indicators
    // ------------------------------------------------------------------

    #[test]
    fn test_indicator_constraints_filter_fields() {
        let mut record = Record::new();
        let mut relator = Field::new("700", '1', '4');
        relator.add_subfield_str('a', "Smith, Jane.");
        record.add_field(relator);
        let mut plain = Field::new("700", '1', ' ');
        plain.add_subfield_str('a', "Doe, John.");
        record.add_field(plain);

        assert_eq!(extractor("700|*4|a").extract(&record), vec!["Smith, Jane."]);
        assert_eq!(
            extractor("700a").extract(&record),
            vec!["Smith, Jane.", "Doe, John."]
        );
    }

    // ------------------------------------------------------------------
    // Alternate script
    // ------------------------------------------------------------------

    fn vernacular_record() -> Record {
        let mut record = Record::new();
        let mut field_245 = Field::new("245", '1', '0');
        field_245.add_subfield_str('6', "880-01");
        field_245.add_subfield_str('a', "Kitab ʻan al-hayah");
        record.add_field(field_245);

        let mut field_880 = Field::new("880", '1', '0');
        field_880.add_subfield_str('6', "245-01/(3/r");
        field_880.add_subfield_str('a', "كتاب عن الحياة");
        record.add_field(field_880);
        record
    }

    #[test]
    fn test_alternate_script_include_by_default() {
        let values = extractor("245a").extract(&vernacular_record());
        assert_eq!(values, vec!["Kitab ʻan al-hayah", "كتاب عن الحياة"]);
    }

    #[test]
    fn test_alternate_script_exclude() {
        let options =
            ExtractorOptions::default().with_alternate_script(AlternateScript::Exclude);
        let ex = MarcExtractor::from_string("245a", &options).unwrap();
        assert_eq!(ex.extract(&vernacular_record()), vec!["Kitab ʻan al-hayah"]);
    }

    #[test]
    fn test_alternate_script_only() {
        let options = ExtractorOptions::default().with_alternate_script(AlternateScript::Only);
        let ex = MarcExtractor::from_string("245a", &options).unwrap();
        assert_eq!(ex.extract(&vernacular_record()), vec!["كتاب عن الحياة"]);
    }

    #[test]
    fn test_880_indicator_constraints_apply_to_the_880_itself() {
        let options = ExtractorOptions::default().with_alternate_script(AlternateScript::Only);
        let ex = MarcExtractor::from_string("245|10|a", &options).unwrap();
        assert_eq!(ex.extract(&vernacular_record()), vec!["كتاب عن الحياة"]);

        let ex = MarcExtractor::from_string("245|11|a", &options).unwrap();
        assert!(ex.extract(&vernacular_record()).is_empty());
    }

    #[test]
    fn test_880_without_linkage_subfield_degrades_to_literal_tag() {
        let mut record = Record::new();
        let mut orphan = Field::new("880", ' ', ' ');
        orphan.add_subfield_str('a', "orphaned vernacular");
        record.add_field(orphan);

        // No 880 spec: nothing matches, nothing raises.
        assert!(extractor("245a").extract(&record).is_empty());
        // An explicit 880 spec picks the orphan up.
        assert_eq!(
            extractor("880a").extract(&record),
            vec!["orphaned vernacular"]
        );
    }

    // ------------------------------------------------------------------
    // Robustness and caching
    // ------------------------------------------------------------------

    #[test]
    fn test_malformed_tags_are_not_interesting() {
        let mut record = Record::new();
        let mut bogus = Field::new("24", ' ', ' ');
        bogus.add_subfield_str('a', "short tag");
        record.add_field(bogus);
        let mut long = Field::new("2450", ' ', ' ');
        long.add_subfield_str('a', "long tag");
        record.add_field(long);

        assert!(extractor("245a").extract(&record).is_empty());
    }

    #[test]
    fn test_cached_returns_shared_instance() {
        let options = ExtractorOptions::default();
        let a = MarcExtractor::cached("245abc", &options).unwrap();
        let b = MarcExtractor::cached("245abc", &options).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = MarcExtractor::cached("245ab", &options).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_cached_distinguishes_options() {
        let a = MarcExtractor::cached("245a", &ExtractorOptions::default()).unwrap();
        let b = MarcExtractor::cached(
            "245a",
            &ExtractorOptions::default().with_alternate_script(AlternateScript::Only),
        )
        .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cached_rejects_bad_spec() {
        assert!(MarcExtractor::cached("bogus!", &ExtractorOptions::default()).is_err());
    }
}
