// src/classify.rs
//! Batch classifier: splits notices into tender-code and keyword matches.
//!
//! The two categories are independent. A notice may land in both, one,
//! or neither, and each output keeps the original batch order.

use std::collections::HashSet;

use crate::error::Result;
use crate::matcher::KeywordPattern;
use crate::notice::Notice;

#[derive(Debug, Clone, Default)]
pub struct ClassifiedBatch {
    pub data: Vec<Notice>,
    pub tender_matches: Vec<Notice>,
    pub keyword_matches: Vec<Notice>,
}

impl ClassifiedBatch {
    pub fn is_empty(&self) -> bool {
        self.tender_matches.is_empty() && self.keyword_matches.is_empty()
    }
}

/// Classify a batch. The keyword set is compiled once for the whole batch.
pub fn classify<T, K>(records: Vec<Notice>, tender_codes: T, keywords: K) -> Result<ClassifiedBatch>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
    K: IntoIterator,
    K::Item: AsRef<str>,
{
    let pattern = KeywordPattern::compile(keywords)?;
    let codes: HashSet<String> = tender_codes
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect();
    Ok(classify_with(records, &codes, &pattern))
}

/// Same as [`classify`], for callers holding a precompiled pattern.
pub fn classify_with(
    records: Vec<Notice>,
    tender_codes: &HashSet<String>,
    pattern: &KeywordPattern,
) -> ClassifiedBatch {
    let mut tender_matches = Vec::new();
    let mut keyword_matches = Vec::new();

    for n in &records {
        if tender_codes.contains(&n.open_tender_code) {
            tender_matches.push(n.clone());
        }
        if pattern.matches(&n.title) {
            keyword_matches.push(n.clone());
        }
    }

    tracing::debug!(
        target: "classify",
        total = records.len(),
        tender = tender_matches.len(),
        keyword = keyword_matches.len(),
        "classified batch"
    );

    ClassifiedBatch {
        data: records,
        tender_matches,
        keyword_matches,
    }
}
