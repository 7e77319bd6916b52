//! Ready-made step factories.
//!
//! Free functions returning step callables — closures capturing
//! precomputed, immutable helper state such as a cached
//! [`MarcExtractor`] — rather than methods on some inheritable base. The
//! returned procs are registered with
//! [`crate::Indexer::to_field`] / [`crate::Indexer::each_record`].
//!
//! # Examples
//!
//! ```ignore
//! use marcdex::transforms::{extract_marc, ExtractMarcOptions};
//!
//! indexer.to_field("title", extract_marc("245ab", &ExtractMarcOptions::default())?)?;
//! indexer.to_field(
//!     "isbn",
//!     extract_marc("020a", &ExtractMarcOptions::default().with_trim_punctuation(true))?,
//! )?;
//! ```

use crate::error::Result;
use crate::extractor::{AlternateScript, ExtractorOptions, MarcExtractor};
use crate::step::{FieldProc, RecordProc};
use lazy_static::lazy_static;
use regex::Regex;

/// Options for [`extract_marc`].
#[derive(Debug, Clone, Default)]
pub struct ExtractMarcOptions {
    /// Extractor options (separator, alternate-script mode).
    pub extractor: ExtractorOptions,
    /// Keep only the first extracted value.
    pub first: bool,
    /// Value contributed when extraction yields nothing.
    pub default: Option<String>,
    /// Apply MARC-style trailing-punctuation cleanup to each value.
    pub trim_punctuation: bool,
}

impl ExtractMarcOptions {
    /// Replace the join separator.
    #[must_use]
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.extractor.separator = separator.to_string();
        self
    }

    /// Replace the alternate-script mode.
    #[must_use]
    pub fn with_alternate_script(mut self, mode: AlternateScript) -> Self {
        self.extractor.alternate_script = mode;
        self
    }

    /// Keep only the first extracted value.
    #[must_use]
    pub fn with_first(mut self, first: bool) -> Self {
        self.first = first;
        self
    }

    /// Contribute this value when extraction yields nothing.
    #[must_use]
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Apply trailing-punctuation cleanup.
    #[must_use]
    pub fn with_trim_punctuation(mut self, trim: bool) -> Self {
        self.trim_punctuation = trim;
        self
    }
}

/// Build a field-mapping proc extracting values per a spec string.
///
/// The extractor is built (and the spec validated) here, at configuration
/// time, and shared by every record the proc sees.
///
/// # Errors
///
/// Fails with [`crate::IndexerError::InvalidSpecification`] on a malformed
/// spec string — before any record is processed.
pub fn extract_marc(spec: &str, options: &ExtractMarcOptions) -> Result<FieldProc> {
    let extractor = MarcExtractor::cached(spec, &options.extractor)?;
    let options = options.clone();
    Ok(FieldProc::from_record_and_accumulator(move |record, acc| {
        let mut values = extractor.extract(record);
        if options.trim_punctuation {
            for value in &mut values {
                *value = trim_punctuation(value);
            }
        }
        if options.first {
            values.truncate(1);
        }
        if values.is_empty() {
            if let Some(default) = &options.default {
                values.push(default.clone());
            }
        }
        acc.extend(values);
        Ok(())
    }))
}

/// Build a proc contributing a constant value to every record.
#[must_use]
pub fn literal(value: &str) -> FieldProc {
    let value = value.to_string();
    FieldProc::from_record_and_accumulator(move |_record, acc| {
        acc.push(value.clone());
        Ok(())
    })
}

/// Build a whole-record proc that skips records where the spec extracts
/// nothing.
///
/// # Errors
///
/// Fails with [`crate::IndexerError::InvalidSpecification`] on a malformed
/// spec string.
pub fn skip_unless_field(spec: &str) -> Result<RecordProc> {
    let extractor = MarcExtractor::cached(spec, &ExtractorOptions::default())?;
    let spec = spec.to_string();
    Ok(RecordProc::from_record_and_context(move |record, ctx| {
        if extractor.extract(record).is_empty() {
            ctx.skip(&format!("record has no {spec}"));
        }
        Ok(())
    }))
}

lazy_static! {
    static ref TRAILING_PUNCT: Regex = Regex::new(r" *[ ,/;:] *\z").unwrap();
    static ref TRAILING_PERIOD: Regex = Regex::new(r"( *[^ ]{3,})\. *\z").unwrap();
}

/// MARC-style trailing-punctuation cleanup.
///
/// Removes one trailing comma/slash/semicolon/colon (with surrounding
/// spaces), a trailing period when the preceding word is long enough not
/// to be an initial or abbreviation, and a leading `[` / trailing `]`.
#[must_use]
pub fn trim_punctuation(value: &str) -> String {
    let mut out = TRAILING_PUNCT.replace(value, "").into_owned();
    out = TRAILING_PERIOD.replace(&out, "$1").into_owned();
    if let Some(stripped) = out.strip_prefix('[') {
        out = stripped.to_string();
    }
    if let Some(stripped) = out.strip_suffix(']') {
        out = stripped.to_string();
    }
    out
}
