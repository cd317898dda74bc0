//! Extraction module: turning a detail page into a record
//!
//! - [`extract`] evaluates one [`FieldSpec`] against a [`Document`]
//! - [`RecordAssembler`] applies the whole field table and the [`Validity`] predicate

mod field;
mod record;

pub use field::{
    extract, Document, ExtractionRule, FieldSpec, FieldValue, PostProcess, MISSING_TEXT,
};
pub use record::{assemble, Assembled, Record, RecordAssembler, Validity};
