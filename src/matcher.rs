// src/matcher.rs
//! Keyword matcher: one compiled alternation over a literal keyword set.
//!
//! Keywords are escaped before joining, so `C++` or `(一期)` are matched
//! literally. Matching runs on `&str`, i.e. on whole UTF-8 scalar values;
//! a keyword can never match half of a multi-byte character.
//! Case-sensitive on purpose (history search is the case-insensitive path).

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::error::Result;

/// Compiled-program budget for the alternation, same as the `regex` default.
pub const DEFAULT_SIZE_LIMIT: usize = 10 * (1 << 20);

#[derive(Debug, Clone)]
pub struct KeywordPattern {
    // None == empty keyword set, which matches nothing.
    re: Option<Regex>,
    keywords: Vec<String>,
}

impl KeywordPattern {
    /// Compile a keyword set. Blank (empty or whitespace-only) keywords are
    /// dropped; an empty set yields a pattern that matches nothing.
    pub fn compile<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::compile_with_size_limit(keywords, DEFAULT_SIZE_LIMIT)
    }

    /// Like [`compile`](Self::compile) with an explicit compiled-size
    /// budget. A set too large for it fails with `Error::InvalidPattern`.
    pub fn compile_with_size_limit<I, S>(keywords: I, size_limit: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // kept verbatim; surrounding spaces are part of the keyword
        let set: BTreeSet<String> = keywords
            .into_iter()
            .filter_map(|k| {
                let k = k.as_ref();
                (!k.trim().is_empty()).then(|| k.to_string())
            })
            .collect();

        if set.is_empty() {
            return Ok(Self {
                re: None,
                keywords: Vec::new(),
            });
        }

        let alternation = set
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let re = RegexBuilder::new(&alternation)
            .size_limit(size_limit)
            .build()?;

        Ok(Self {
            re: Some(re),
            keywords: set.into_iter().collect(),
        })
    }

    /// True iff any keyword occurs as a substring of `title`.
    pub fn matches(&self, title: &str) -> bool {
        self.re.as_ref().is_some_and(|re| re.is_match(title))
    }

    pub fn is_empty(&self) -> bool {
        self.re.is_none()
    }

    /// Keywords in compiled (sorted, deduplicated) order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
