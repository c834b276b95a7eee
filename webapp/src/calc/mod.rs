pub mod updates;
pub mod vulnerabilities;
pub mod cves;
pub mod errata;
pub mod repos;
pub mod packages;
pub mod dbchange;

use crate::error::{Error, Result};
use cache::{Cache, PkgId};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// A request answerable from one cache generation.
pub trait Calculate {
    type Response: Serialize;

    /// Structural checks, run before the cache is consulted.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn calculate(&self, cache: &Cache) -> Result<Self::Response>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RequestPaging {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponsePaging {
    pub page: usize,
    /// Length of the returned page, not the requested size
    pub page_size: usize,
    pub pages: usize,
}

fn positive_or(value: i64, default: usize) -> usize {
    if value > 0 {
        value as usize
    } else {
        default
    }
}

/// Sorts and deduplicates `items`, keeps those passing `filter` and cuts out the requested page.
pub fn paginate<T: Ord>(
    items: Vec<T>,
    paging: RequestPaging,
    filter: impl Fn(&T) -> bool,
) -> (Vec<T>, ResponsePaging) {
    let page = positive_or(paging.page, DEFAULT_PAGE);
    let page_size = positive_or(paging.page_size, DEFAULT_PAGE_SIZE);

    let matching: Vec<T> = items
        .into_iter()
        .sorted()
        .dedup()
        .filter(|item| filter(item))
        .collect();
    let pages = (matching.len() + page_size - 1) / page_size;
    let start = (page - 1).saturating_mul(page_size);

    let slice: Vec<T> = matching.into_iter().skip(start).take(page_size).collect();
    let meta = ResponsePaging {
        page,
        page_size: slice.len(),
        pages,
    };
    (slice, meta)
}

/// Compiles `pattern` so that it has to match a whole name.
pub fn anchor_regex(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

/// A single requested name is a pattern expanded against `known`, several are taken literally.
pub fn expand_names<'a>(
    requested: &[String],
    known: impl Iterator<Item = &'a String>,
) -> Result<Vec<String>> {
    match requested {
        [pattern] => {
            let re = anchor_regex(pattern)?;
            Ok(known.filter(|name| re.is_match(name)).cloned().collect())
        }
        _ => Ok(requested.to_vec()),
    }
}

/// Formats packages, split into binary and source (`src` arch) ones. Unknown ids are skipped.
pub fn split_by_type(cache: &Cache, ids: &[PkgId]) -> (Vec<String>, Vec<String>) {
    let mut binaries = vec![];
    let mut sources = vec![];
    for pkg in ids.iter().filter_map(|id| cache.packages.get(id)) {
        if cache.is_source(pkg) {
            sources.push(cache.format_package(pkg));
        } else {
            binaries.push(cache.format_package(pkg));
        }
    }
    (binaries, sources)
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.to_rfc3339()).unwrap_or_default()
}

pub fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.3}", s)).unwrap_or_default()
}

/// `true` when `date` is set and strictly after `since`
pub(crate) fn after(date: Option<DateTime<Utc>>, since: DateTime<Utc>) -> bool {
    date.map_or(false, |d| d > since)
}

pub(crate) fn require_list(list: &Option<Vec<String>>, field: &'static str) -> Result<()> {
    match list {
        None => Err(Error::MissingField(field)),
        Some(l) if l.is_empty() => Err(Error::EmptyList(field)),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paging(page: i64, page_size: i64) -> RequestPaging {
        RequestPaging { page, page_size }
    }

    #[test]
    fn test_paginate_defaults() {
        let items = vec!["b", "a", "c"];
        let (page, meta) = paginate(items, RequestPaging::default(), |_| true);
        assert_eq!(page, vec!["a", "b", "c"]);
        assert_eq!(
            meta,
            ResponsePaging {
                page: 1,
                page_size: 3,
                pages: 1
            }
        );
    }

    #[test]
    fn test_pages_concatenate_to_filtered_set() {
        let items: Vec<String> = (0..23).rev().map(|i| format!("item-{:02}", i)).collect();
        let keep = |s: &String| !s.ends_with('7');
        let (all, _) = paginate(items.clone(), paging(1, 1000), keep);
        assert_eq!(all.len(), 21);

        for size in 1..=25 {
            let (_, first) = paginate(items.clone(), paging(1, size), keep);
            let expected_pages = (21 + size as usize - 1) / size as usize;
            assert_eq!(first.pages, expected_pages);

            let joined: Vec<String> = (1..=first.pages as i64)
                .flat_map(|p| paginate(items.clone(), paging(p, size), keep).0)
                .collect();
            assert_eq!(joined, all);
        }
    }

    #[test]
    fn test_out_of_range_page_is_empty() {
        let (page, meta) = paginate(vec![1, 2, 3], paging(5, 2), |_| true);
        assert!(page.is_empty());
        assert_eq!(meta.page, 5);
        assert_eq!(meta.page_size, 0);
        assert_eq!(meta.pages, 2);
    }

    #[test]
    fn test_paginate_dedups() {
        let (page, meta) = paginate(vec!["x", "x", "y"], paging(0, -1), |_| true);
        assert_eq!(page, vec!["x", "y"]);
        assert_eq!(meta.pages, 1);
    }

    #[test]
    fn test_anchor_regex() {
        let re = anchor_regex("CVE-2020-.*").unwrap();
        assert!(re.is_match("CVE-2020-0001"));
        assert!(!re.is_match("XCVE-2020-0001"));

        // Alternation stays inside the anchors
        let re = anchor_regex("a|b").unwrap();
        assert!(re.is_match("a"));
        assert!(!re.is_match("ab"));

        assert!(anchor_regex("(").is_err());
    }

    #[test]
    fn test_expand_names() {
        let known: Vec<String> = vec!["RHSA-1".into(), "RHBA-2".into(), "RHSA-3".into()];
        let mut found = expand_names(&["RHSA-.*".to_string()], known.iter()).unwrap();
        found.sort();
        assert_eq!(found, vec!["RHSA-1", "RHSA-3"]);

        let literal = vec!["RHSA-.*".to_string(), "nope".to_string()];
        assert_eq!(expand_names(&literal, known.iter()).unwrap(), literal);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(Some(7.5)), "7.500");
        assert_eq!(format_score(Some(10.0)), "10.000");
        assert_eq!(format_score(None), "");
    }
}
