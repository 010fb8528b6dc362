//! Term and item occurrence counting for text and items predicates.
//!
//! Text predicates compare the number of occurrences of a term (or any of
//! its alternate forms) against a threshold. Items predicates do the same
//! for separator-delimited item lists.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::repr::{ItemAnalysis, TermAnalysis, TokenMode};

/// A term with a word boundary strictly inside it ("new york", "e-mail").
fn full_term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^.+\b.+$").expect("static pattern is valid"))
}

/// Whether `term` is matched against the whole text rather than as a token.
pub fn is_full_term(term: &str, analysis: &TermAnalysis) -> bool {
    match analysis.token_mode {
        TokenMode::FullTermsOnly => true,
        TokenMode::All => full_term_pattern().is_match(term),
        TokenMode::TokensOnly => false,
    }
}

/// Compiled occurrence counter for one term or item.
#[derive(Debug, Clone)]
pub enum TermMatcher {
    /// The whole text must equal the term.
    FullTerm { term: String, case_sensitive: bool },
    /// Non-overlapping regex matches are counted.
    Pattern(Regex),
    /// Matches nothing.
    Never,
}

impl TermMatcher {
    /// Matcher of a text term; `forms` holds the term first, followed by its
    /// alternate forms.
    pub fn for_term(forms: &[&str], analysis: &TermAnalysis) -> Self {
        let Some(&first) = forms.first() else {
            return Self::Never;
        };
        let full_term = match analysis.token_mode {
            TokenMode::FullTermsOnly => true,
            TokenMode::All => forms.len() == 1 && full_term_pattern().is_match(first),
            TokenMode::TokensOnly => false,
        };
        if full_term {
            return Self::FullTerm {
                term: first.to_string(),
                case_sensitive: analysis.case_sensitive,
            };
        }

        let expression = forms
            .iter()
            .map(|form| format!(r"(\b|_){}(\b|_)", regex::escape(form)))
            .collect::<Vec<_>>()
            .join("|");
        RegexBuilder::new(&expression)
            .case_insensitive(!analysis.case_sensitive)
            .build()
            .map_or(Self::Never, Self::Pattern)
    }

    /// Matcher of one item in a separator-delimited list.
    pub fn for_item(item: &str, analysis: &ItemAnalysis) -> Self {
        let separator = match (&analysis.separator_regexp, &analysis.separator) {
            (Some(regexp), _) => regexp.clone(),
            (None, Some(sep)) => regex::escape(sep),
            (None, None) => regex::escape(" "),
        };
        let expression = format!("(^|{separator}){}($|{separator})", regex::escape(item));
        Regex::new(&expression).map_or(Self::Never, Self::Pattern)
    }

    /// Number of occurrences in `text`.
    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::FullTerm {
                term,
                case_sensitive: true,
            } => usize::from(text == term),
            Self::FullTerm { term, .. } => usize::from(text.to_lowercase() == term.to_lowercase()),
            Self::Pattern(re) => re.find_iter(text).count(),
            Self::Never => 0,
        }
    }
}

/// Count occurrences of a term in `text`.
///
/// `forms` holds the term first, followed by its alternate forms.
pub fn term_matches(text: &str, forms: &[&str], analysis: &TermAnalysis) -> usize {
    TermMatcher::for_term(forms, analysis).count(text)
}

/// Count occurrences of `item` in a separator-delimited `text`.
pub fn item_matches(text: &str, item: &str, analysis: &ItemAnalysis) -> usize {
    TermMatcher::for_item(item, analysis).count(text)
}
