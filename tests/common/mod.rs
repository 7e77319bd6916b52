//! Common test helpers shared across the integration test suite.

use marcdex::{Field, Record};

/// A typical bibliographic record: control number, fixed field, title,
/// authors, ISBNs.
#[must_use]
#[allow(dead_code)]
pub fn create_test_record() -> Record {
    Record::builder()
        .leader("00924nam a2200229 a 4500")
        .control_field_str("001", "ocm0000001")
        .control_field_str("008", "850101s2002    nyu           000 0 eng d")
        .field(
            Field::builder("020", ' ', ' ')
                .subfield_str('a', "0-13-110362-8")
                .build(),
        )
        .field(
            Field::builder("100", '1', ' ')
                .subfield_str('a', "Herman, Edward S.")
                .build(),
        )
        .field(
            Field::builder("245", '1', '0')
                .subfield_str('a', "Manufacturing consent :")
                .subfield_str('b', "the political economy of the mass media /")
                .subfield_str('c', "Edward S. Herman and Noam Chomsky.")
                .build(),
        )
        .field(
            Field::builder("700", '1', ' ')
                .subfield_str('a', "Chomsky, Noam.")
                .build(),
        )
        .build()
}

/// A record whose 245 is paired with an 880 alternate-script rendering.
#[must_use]
#[allow(dead_code)]
pub fn create_vernacular_record() -> Record {
    Record::builder()
        .control_field_str("001", "ocm0000002")
        .field(
            Field::builder("245", '1', '0')
                .subfield_str('6', "880-01")
                .subfield_str('a', "Kitab ʻan al-hayah")
                .build(),
        )
        .field(
            Field::builder("880", '1', '0')
                .subfield_str('6', "245-01/(3/r")
                .subfield_str('a', "كتاب عن الحياة")
                .build(),
        )
        .build()
}

/// A minimal record with a control number and single title subfield.
#[must_use]
#[allow(dead_code)]
pub fn titled_record(id: &str, title: &str) -> Record {
    Record::builder()
        .control_field_str("001", id)
        .field(Field::builder("245", '1', '0').subfield_str('a', title).build())
        .build()
}
