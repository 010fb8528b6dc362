//! Split predicates.
//!
//! A [`Predicate`] is the test attached to a child node: the child is taken
//! when the predicate holds for the input record.

use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::inference::text::{is_full_term, TermMatcher};

use super::field::{Fields, Optype};
use super::value::{InputRecord, Value};

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    Lt = 0,
    Le = 1,
    Eq = 2,
    Ne = 3,
    Ge = 4,
    Gt = 5,
    In = 6,
}

impl Operator {
    /// Parse the textual operator used in model exports.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "<" => Self::Lt,
            "<=" => Self::Le,
            "=" | "==" => Self::Eq,
            "!=" | "/=" => Self::Ne,
            ">=" => Self::Ge,
            ">" => Self::Gt,
            "in" => Self::In,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::In => "in",
        }
    }

    /// Numeric opcode used in the packed tree layout.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Lt,
            1 => Self::Le,
            2 => Self::Eq,
            3 => Self::Ne,
            4 => Self::Ge,
            5 => Self::Gt,
            6 => Self::In,
            _ => return None,
        })
    }

    /// Whether `lhs op rhs` holds given their ordering.
    ///
    /// Incomparable operands (`None`) only satisfy `!=`.
    #[inline]
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            Self::Ne => ordering != Some(Ordering::Equal),
            Self::Lt => ordering == Some(Ordering::Less),
            Self::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Self::Eq => ordering == Some(Ordering::Equal),
            Self::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Self::Gt => ordering == Some(Ordering::Greater),
            Self::In => false,
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PredicateValue {
    /// No value: used by explicit "is missing" / "is not missing" splits.
    #[default]
    Null,
    Number(f64),
    Text(String),
    /// Membership set for the `in` operator.
    Set(Vec<Value>),
}

impl PredicateValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Set(values) => {
                let items: Vec<String> = values.iter().map(Value::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<f64> for PredicateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PredicateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Term matcher compiled on first evaluation.
///
/// Never part of a predicate's identity: two predicates compare equal
/// whether or not either has been evaluated.
#[derive(Debug, Clone, Default)]
struct MatcherCache(OnceLock<TermMatcher>);

impl PartialEq for MatcherCache {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

/// A split condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    operator: Operator,
    field: String,
    value: PredicateValue,
    term: Option<String>,
    missing: bool,
    matcher: MatcherCache,
}

impl Predicate {
    pub fn new(operator: Operator, field: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self {
            operator,
            field: field.into(),
            value: value.into(),
            term: None,
            missing: false,
            matcher: MatcherCache::default(),
        }
    }

    /// Attach a term (text and items predicates).
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self.matcher = MatcherCache::default();
        self
    }

    /// Mark the predicate as also matching absent values.
    pub fn with_missing(mut self, missing: bool) -> Self {
        self.missing = missing;
        self
    }

    #[inline]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    pub fn value(&self) -> &PredicateValue {
        &self.value
    }

    #[inline]
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    #[inline]
    pub fn missing(&self) -> bool {
        self.missing
    }

    /// Evaluate the predicate against one record.
    pub fn apply(&self, record: &InputRecord, fields: &Fields) -> bool {
        let optype = fields.optype(&self.field);
        let input = record.get(&self.field);

        match input {
            // Absent text/items count as zero occurrences of the term.
            None if self.term.is_none() => {
                return self.missing || (self.operator == Operator::Eq && self.value.is_null());
            }
            Some(_) if self.operator == Operator::Ne && self.value.is_null() => return true,
            _ => {}
        }

        if let Some(term) = &self.term {
            let text = input.and_then(Value::as_str).unwrap_or("");
            let occurrences = self.count_term(text, term, optype, fields) as f64;
            return self
                .operator
                .holds(self.value.as_f64().and_then(|v| occurrences.partial_cmp(&v)));
        }

        let Some(input) = input else {
            return false;
        };

        match (&self.value, self.operator) {
            (PredicateValue::Set(set), Operator::In) => set.contains(input),
            (_, Operator::In) | (PredicateValue::Set(_), _) => false,
            (PredicateValue::Null, op) => op == Operator::Ne,
            (PredicateValue::Number(rhs), op) => {
                op.holds(input.as_f64().and_then(|lhs| lhs.partial_cmp(rhs)))
            }
            (PredicateValue::Text(rhs), op) => {
                op.holds(input.as_str().map(|lhs| lhs.cmp(rhs.as_str())))
            }
        }
    }

    /// Occurrences of `term` in `text`.
    ///
    /// The matcher is compiled against `fields` on first use; a predicate
    /// belongs to a single model, so later calls see the same field.
    fn count_term(&self, text: &str, term: &str, optype: Optype, fields: &Fields) -> usize {
        self.term_matcher(term, optype, fields).count(text)
    }

    fn term_matcher(&self, term: &str, optype: Optype, fields: &Fields) -> &TermMatcher {
        self.matcher.0.get_or_init(|| {
            let Some(field) = fields.get(&self.field) else {
                return TermMatcher::Never;
            };
            match optype {
                Optype::Items => TermMatcher::for_item(term, &field.item_analysis),
                _ => {
                    let forms: Vec<&str> = std::iter::once(term)
                        .chain(field.term_forms(term).iter().map(String::as_str))
                        .collect();
                    TermMatcher::for_term(&forms, &field.term_analysis)
                }
            }
        })
    }

    /// Whether the term is matched against the whole text.
    fn matches_full_term(&self, fields: &Fields) -> bool {
        match (&self.term, fields.get(&self.field)) {
            (Some(term), Some(field)) if field.optype == Optype::Text => {
                is_full_term(term, &field.term_analysis)
            }
            _ => false,
        }
    }

    /// Human-readable rule, as appended to a prediction path.
    pub fn to_rule(&self, fields: &Fields) -> String {
        let name = fields.name(&self.field);
        let or_missing = if self.missing { " or missing" } else { "" };

        if let Some(term) = &self.term {
            let full_term = self.matches_full_term(fields);
            let times = self.value.as_f64().unwrap_or(0.0);
            let absent = (self.operator == Operator::Lt && times <= 1.0)
                || (self.operator == Operator::Le && times == 0.0);

            if absent {
                let relation = if full_term { "is not equal to" } else { "does not contain" };
                return format!("{name} {relation} {term}{or_missing}");
            }
            let relation = if full_term { "is equal to" } else { "contains" };
            let suffix = if full_term || (self.operator == Operator::Gt && times == 0.0) {
                String::new()
            } else {
                format!(" {}", occurrence_phrase(self.operator, times))
            };
            return format!("{name} {relation} {term}{suffix}{or_missing}");
        }

        match (&self.value, self.operator) {
            (PredicateValue::Null, Operator::Eq) => format!("{name} is missing"),
            (PredicateValue::Null, _) => format!("{name} is not missing"),
            (value, op) => format!("{name} {} {value}{or_missing}", op.symbol()),
        }
    }
}

fn occurrence_phrase(operator: Operator, times: f64) -> String {
    let unit = if times == 1.0 { "time" } else { "times" };
    match operator {
        Operator::Lt => format!("less than {times} {unit}"),
        Operator::Le => format!("no more than {times} {unit}"),
        Operator::Gt => format!("more than {times} {unit}"),
        Operator::Ge => format!("at least {times} {unit}"),
        Operator::Eq => format!("exactly {times} {unit}"),
        Operator::Ne | Operator::In => format!("not exactly {times} {unit}"),
    }
}
