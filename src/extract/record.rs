//! Record assembly and validity
//!
//! The assembler runs every configured field over one document and reports whether
//! the result qualifies. It never discards anything itself; the orchestrator decides
//! what to keep so that "skipped" stays distinct from "error".

use crate::extract::field::{extract, Document, FieldSpec, FieldValue, MISSING_TEXT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One listing, extracted from one detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Page the record was extracted from
    pub url: String,

    /// Field name to extracted value
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Returns the value of a field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Predicate deciding whether an assembled record is usable
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Validity {
    /// Every fetched record qualifies
    AcceptAll,
    /// The named field must hold a nonzero number
    NonZero { field: String },
}

impl Default for Validity {
    fn default() -> Self {
        Self::NonZero {
            field: "price".to_string(),
        }
    }
}

impl Validity {
    /// Returns true if the record qualifies
    pub fn accepts(&self, record: &Record) -> bool {
        match self {
            Self::AcceptAll => true,
            Self::NonZero { field } => match record.get(field) {
                Some(FieldValue::Integer(n)) => *n != 0,
                Some(FieldValue::Text(text)) => {
                    text != MISSING_TEXT && text.chars().any(|c| c.is_ascii_digit() && c != '0')
                }
                None => false,
            },
        }
    }
}

/// Applies every field to a document
///
/// With no document, every field takes its sentinel.
pub fn assemble(document: Option<&Document>, url: &str, fields: &[FieldSpec]) -> Record {
    let fields = fields
        .iter()
        .map(|spec| (spec.name.clone(), extract(document, spec)))
        .collect();

    Record {
        url: url.to_string(),
        fields,
    }
}

/// A record together with its validity verdict
#[derive(Debug, Clone)]
pub struct Assembled {
    pub record: Record,
    pub valid: bool,
}

/// Field table and validity predicate, shared by all workers
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    fields: Arc<[FieldSpec]>,
    validity: Validity,
}

impl RecordAssembler {
    pub fn new(fields: Vec<FieldSpec>, validity: Validity) -> Self {
        Self {
            fields: fields.into(),
            validity,
        }
    }

    /// The configured field table
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Parses a fetched body, assembles the record, and judges it
    ///
    /// The parsed document lives only for the duration of this call.
    pub fn assemble_body(&self, body: &str, url: &str) -> Assembled {
        let document = Document::parse(body);
        let record = assemble(Some(&document), url, &self.fields);
        let valid = self.validity.accepts(&record);
        Assembled { record, valid }
    }
}
