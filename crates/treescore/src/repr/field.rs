//! Field descriptors.
//!
//! Only the parts of a field's training-time metadata that prediction needs
//! are kept: optype, display name, summary (for text term forms) and the
//! text/items analysis options.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optype {
    #[default]
    Numeric,
    Categorical,
    Text,
    Items,
    Datetime,
}

/// How text is tokenized when matching a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Count word-bounded token occurrences.
    #[default]
    TokensOnly,
    /// The whole text must equal the term.
    FullTermsOnly,
    /// Multi-word terms match as full terms, single tokens as tokens.
    All,
}

/// Text analysis settings of a text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermAnalysis {
    #[serde(default)]
    pub token_mode: TokenMode,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Item splitting settings of an items field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAnalysis {
    /// Literal separator. Default: a single space.
    #[serde(default)]
    pub separator: Option<String>,
    /// Separator regular expression; takes precedence over `separator`.
    #[serde(default)]
    pub separator_regexp: Option<String>,
}

/// Training-time summary of a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSummary {
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub missing_count: u64,
    /// Category counts (categorical fields).
    pub categories: Vec<(String, f64)>,
    /// Alternate forms of each term (text fields).
    pub term_forms: HashMap<String, Vec<String>>,
    /// Term counts (text fields).
    pub tag_cloud: Vec<(String, f64)>,
    /// Item counts (items fields).
    pub items: Vec<(String, f64)>,
}

/// Descriptor of one input field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    pub optype: Optype,
    pub summary: FieldSummary,
    pub term_analysis: TermAnalysis,
    pub item_analysis: ItemAnalysis,
}

impl FieldDescriptor {
    /// Create a descriptor with empty summary and default analysis options.
    pub fn new(id: impl Into<String>, name: impl Into<String>, optype: Optype) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            optype,
            summary: FieldSummary::default(),
            term_analysis: TermAnalysis::default(),
            item_analysis: ItemAnalysis::default(),
        }
    }

    pub fn with_term_analysis(mut self, analysis: TermAnalysis) -> Self {
        self.term_analysis = analysis;
        self
    }

    pub fn with_item_analysis(mut self, analysis: ItemAnalysis) -> Self {
        self.item_analysis = analysis;
        self
    }

    pub fn with_term_forms(mut self, term: impl Into<String>, forms: Vec<String>) -> Self {
        self.summary.term_forms.insert(term.into(), forms);
        self
    }

    /// Alternate forms recorded for `term`, if any.
    pub fn term_forms(&self, term: &str) -> &[String] {
        self.summary
            .term_forms
            .get(term)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Field table keyed by field id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    by_id: HashMap<String, FieldDescriptor>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor (builder pattern).
    pub fn with(mut self, field: FieldDescriptor) -> Self {
        self.insert(field);
        self
    }

    pub fn insert(&mut self, field: FieldDescriptor) {
        self.by_id.insert(field.id.clone(), field);
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<&FieldDescriptor> {
        self.by_id.get(id)
    }

    /// Optype of a field; unknown fields are treated as numeric.
    #[inline]
    pub fn optype(&self, id: &str) -> Optype {
        self.get(id).map(|f| f.optype).unwrap_or_default()
    }

    /// Display name of a field, falling back to its id.
    pub fn name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|f| f.name.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.by_id.values()
    }
}

impl FromIterator<FieldDescriptor> for Fields {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        Self {
            by_id: iter.into_iter().map(|f| (f.id.clone(), f)).collect(),
        }
    }
}
