//! Field extraction with ordered fallback rules
//!
//! A field is described once as data: a name, the rules to try in order, and how
//! the winning text is post-processed. Extraction never fails; a field that no rule
//! can produce comes back as its sentinel.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for a text field that could not be extracted
pub const MISSING_TEXT: &str = "N/A";

/// A parsed page
///
/// Owned by the extraction call that parsed it and dropped once the record is built.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses an HTML body
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    pub(crate) fn html(&self) -> &Html {
        &self.html
    }
}

/// One selector strategy for a field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractionRule {
    /// CSS selector evaluated against the whole document
    pub selector: String,

    /// Which of the surviving matches to use
    #[serde(default)]
    pub index: usize,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    /// Keep only matches whose text contains one of these substrings
    #[serde(default)]
    pub contains: Vec<String>,

    /// Drop matches shorter than this many characters
    #[serde(rename = "min-len", default)]
    pub min_len: usize,
}

impl ExtractionRule {
    /// Creates a rule that takes the first non-empty match of `selector`
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            index: 0,
            attr: None,
            contains: Vec::new(),
            min_len: 0,
        }
    }

    /// Selects the match at `index` instead of the first one
    pub fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Reads `attr` from the matched elements
    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    /// Requires the match text to contain one of `needles`
    pub fn containing<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contains = needles.into_iter().map(Into::into).collect();
        self
    }

    /// Requires the match text to be at least `min_len` characters
    pub fn min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    /// Evaluates the rule and returns every surviving match, trimmed
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Matches in document order, possibly empty
    /// * `Err(String)` - The selector could not be parsed
    pub fn matches(&self, document: &Document) -> Result<Vec<String>, String> {
        let selector = Selector::parse(&self.selector)
            .map_err(|e| format!("invalid selector '{}': {:?}", self.selector, e))?;

        Ok(document
            .html()
            .select(&selector)
            .filter_map(|element| self.read(element))
            .filter(|text| !text.is_empty())
            .filter(|text| text.chars().count() >= self.min_len)
            .filter(|text| {
                self.contains.is_empty() || self.contains.iter().any(|n| text.contains(n.as_str()))
            })
            .collect())
    }

    fn read(&self, element: ElementRef<'_>) -> Option<String> {
        match &self.attr {
            Some(attr) => element.value().attr(attr).map(|v| v.trim().to_string()),
            None => Some(collapse_whitespace(element.text())),
        }
    }
}

/// Joins text nodes and collapses runs of whitespace, including non-breaking spaces
fn collapse_whitespace<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// How the winning raw text becomes a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostProcess {
    /// Trimmed text; sentinel "N/A"
    #[default]
    Text,
    /// Digits only, parsed as an integer; sentinel 0
    Integer,
    /// Digits only, kept as text; sentinel "N/A"
    Digits,
    /// Date text passed through for the sink to normalize; sentinel "N/A"
    Date,
}

impl PostProcess {
    /// Converts raw text, or returns None if nothing usable remains
    pub fn apply(&self, raw: &str) -> Option<FieldValue> {
        match self {
            Self::Text | Self::Date => {
                let text = raw.trim();
                (!text.is_empty()).then(|| FieldValue::Text(text.to_string()))
            }
            Self::Integer => digits_only(raw)
                .and_then(|digits| digits.parse::<u64>().ok())
                .map(FieldValue::Integer),
            Self::Digits => digits_only(raw).map(FieldValue::Text),
        }
    }

    /// The value a field takes when no rule produced one
    pub fn sentinel(&self) -> FieldValue {
        match self {
            Self::Integer => FieldValue::Integer(0),
            Self::Text | Self::Digits | Self::Date => FieldValue::Text(MISSING_TEXT.to_string()),
        }
    }
}

fn digits_only(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// An extracted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
}

impl FieldValue {
    /// Returns the integer, if this is one
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Returns the text, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }

    /// Returns true for either sentinel
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Text(s) => s == MISSING_TEXT,
            Self::Integer(n) => *n == 0,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// Declarative description of one extractable attribute
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    /// Record key
    pub name: String,

    /// Output column header; defaults to the name
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub post: PostProcess,

    /// Fallback rules, tried in order
    pub rules: Vec<ExtractionRule>,
}

impl FieldSpec {
    /// Creates a field with no rules
    pub fn new(name: impl Into<String>, post: PostProcess) -> Self {
        Self {
            name: name.into(),
            column: None,
            post,
            rules: Vec::new(),
        }
    }

    /// Appends a fallback rule
    pub fn rule(mut self, rule: ExtractionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the output column header
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Header used for this field in the output file
    pub fn column_label(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Extracts one field from a document
///
/// Rules are tried in order; the first whose selected match survives
/// post-processing wins. A rule whose selector fails to evaluate counts as a miss.
/// With no document every field is its sentinel.
///
/// # Example
///
/// ```
/// use listing_scraper::extract::{extract, Document, ExtractionRule, FieldSpec, FieldValue, PostProcess};
///
/// let doc = Document::parse(r#"<span class="price">1 250 000 ₽</span>"#);
/// let price = FieldSpec::new("price", PostProcess::Integer).rule(ExtractionRule::new("span.price"));
/// assert_eq!(extract(Some(&doc), &price), FieldValue::Integer(1_250_000));
/// assert_eq!(extract(None, &price), FieldValue::Integer(0));
/// ```
pub fn extract(document: Option<&Document>, spec: &FieldSpec) -> FieldValue {
    let Some(document) = document else {
        return spec.post.sentinel();
    };

    for rule in &spec.rules {
        let matches = match rule.matches(document) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!("Rule for field '{}' skipped: {}", spec.name, e);
                continue;
            }
        };

        if let Some(value) = matches.get(rule.index).and_then(|raw| spec.post.apply(raw)) {
            return value;
        }
    }

    tracing::trace!("No rule matched field '{}'", spec.name);
    spec.post.sentinel()
}
