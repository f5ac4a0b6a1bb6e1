// src/render.rs
//! Markdown-ish message rendering for classified notices.
//!
//! Two fixed templates, chosen by category. Fields are substituted
//! verbatim (no escaping); markup in `content` passes through untouched.
//! Output is keyed by title, and keyword renders are applied after tender
//! renders, so a title present in both categories ends up with the
//! keyword text.

use std::collections::BTreeMap;

use crate::classify::ClassifiedBatch;
use crate::error::{Error, Result};
use crate::notice::Notice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Tender,
    Keyword,
}

impl Category {
    pub fn template(self) -> &'static Template {
        match self {
            Category::Tender => &TENDER_TEMPLATE,
            Category::Keyword => &KEYWORD_TEMPLATE,
        }
    }
}

/// `【label】[title](pageurl)\ncontent` followed by `trailer`.
#[derive(Debug)]
pub struct Template {
    pub name: &'static str,
    label: &'static str,
    trailer: &'static str,
}

pub static TENDER_TEMPLATE: Template = Template {
    name: "tender_template",
    label: "项目号",
    trailer: "\n",
};

pub static KEYWORD_TEMPLATE: Template = Template {
    name: "keyword_template",
    label: "关键字",
    trailer: "",
};

impl Template {
    pub fn execute(&self, n: &Notice) -> Result<String> {
        if n.title.trim().is_empty() {
            return Err(Error::RenderFailure {
                title: n.title.clone(),
                reason: format!("{}: title is required", self.name),
            });
        }
        Ok(format!(
            "【{}】[{}]({})\n{}{}",
            self.label, n.title, n.pageurl, n.content, self.trailer
        ))
    }
}

/// A rendered notice with the fields the delivery layer still needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub category: Category,
    pub title: String,
    pub pageurl: String,
    pub text: String,
}

/// Render both categories in order (tender first, then keyword).
/// Failures are logged and the notice skipped.
pub fn render_entries(tender_matches: &[Notice], keyword_matches: &[Notice]) -> Vec<Rendered> {
    let tagged = tender_matches
        .iter()
        .map(|n| (Category::Tender, n))
        .chain(keyword_matches.iter().map(|n| (Category::Keyword, n)));

    let mut out = Vec::with_capacity(tender_matches.len() + keyword_matches.len());
    for (category, n) in tagged {
        match category.template().execute(n) {
            Ok(text) => out.push(Rendered {
                category,
                title: n.title.clone(),
                pageurl: n.pageurl.clone(),
                text,
            }),
            Err(e) => {
                tracing::warn!(target: "render", error = %e, pageurl = %n.pageurl, "skipping notice");
            }
        }
    }
    out
}

/// Rendered entries keyed by title, last write wins.
pub fn render_keyed(
    tender_matches: &[Notice],
    keyword_matches: &[Notice],
) -> BTreeMap<String, Rendered> {
    render_entries(tender_matches, keyword_matches)
        .into_iter()
        .map(|r| (r.title.clone(), r))
        .collect()
}

/// Title → message text.
pub fn render(tender_matches: &[Notice], keyword_matches: &[Notice]) -> BTreeMap<String, String> {
    render_keyed(tender_matches, keyword_matches)
        .into_iter()
        .map(|(title, r)| (title, r.text))
        .collect()
}

pub fn render_batch(batch: &ClassifiedBatch) -> BTreeMap<String, String> {
    render(&batch.tender_matches, &batch.keyword_matches)
}
