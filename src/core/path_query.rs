// src/core/path_query.rs

//! Multi-term fuzzy lookup over an [`IndexSnapshot`].
//!
//! Every term is matched case-insensitively against the normalized path and
//! scored by how well it lines up with a path segment:
//!
//! | match | score |
//! |---|---|
//! | equals a whole segment | 100 |
//! | prefix of a segment | 50 |
//! | anywhere else in the path | 10 |
//!
//! Paths containing every term win. Only when no path contains every term do
//! paths containing at least one term qualify. Ranking is score (high first),
//! then path length (short first), then the path itself.

use crate::core::path_index::IndexSnapshot;
use crate::models::IndexEntry;
use rayon::prelude::*;
use std::cmp::Reverse;

const EXACT_SEGMENT_SCORE: u32 = 100;
const PREFIX_SCORE: u32 = 50;
const SUBSTRING_SCORE: u32 = 10;

/// Which matching rule produced the hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every term is present.
    All,
    /// At least one term is present (fallback).
    Any,
}

/// One matching entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHit {
    /// The indexed entry.
    pub entry: IndexEntry,
    /// Higher is better.
    pub score: u32,
}

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Lowercased search terms.
    pub terms: Vec<String>,
    /// Whether all terms or any term had to match.
    pub mode: MatchMode,
    /// Best hits first, truncated to the limit.
    pub hits: Vec<QueryHit>,
}

/// Lowercased, de-duplicated terms in input order.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in text.split_whitespace().map(str::to_lowercase) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn term_score(segments: &[&str], lower_path: &str, term: &str) -> u32 {
    if segments.iter().any(|segment| *segment == term) {
        EXACT_SEGMENT_SCORE
    } else if segments.iter().any(|segment| segment.starts_with(term)) {
        PREFIX_SCORE
    } else if lower_path.contains(term) {
        SUBSTRING_SCORE
    } else {
        0
    }
}

/// Returns how many terms matched `path` and their summed score.
pub fn score_path(path: &str, terms: &[String]) -> (usize, u32) {
    let lower_path = path.to_lowercase();
    let segments: Vec<&str> = lower_path.split('/').filter(|s| !s.is_empty()).collect();
    terms
        .iter()
        .map(|term| term_score(&segments, &lower_path, term))
        .filter(|score| *score > 0)
        .fold((0, 0), |(matched, total), score| (matched + 1, total + score))
}

/// Runs a query against one snapshot, returning at most `limit` hits.
pub fn run_query(snapshot: &IndexSnapshot, text: &str, limit: usize) -> QueryResult {
    let terms = query_terms(text);
    if terms.is_empty() || limit == 0 {
        return QueryResult {
            terms,
            mode: MatchMode::All,
            hits: Vec::new(),
        };
    }

    let candidates: Vec<(usize, QueryHit)> = snapshot
        .entries
        .par_iter()
        .filter_map(|(path, entry)| {
            let (matched, score) = score_path(path, &terms);
            (matched > 0).then(|| {
                (
                    matched,
                    QueryHit {
                        entry: entry.clone(),
                        score,
                    },
                )
            })
        })
        .collect();

    let has_full_match = candidates.iter().any(|(matched, _)| *matched == terms.len());
    let mode = if has_full_match {
        MatchMode::All
    } else {
        MatchMode::Any
    };

    let mut hits: Vec<QueryHit> = candidates
        .into_iter()
        .filter(|(matched, _)| mode == MatchMode::Any || *matched == terms.len())
        .map(|(_, hit)| hit)
        .collect();

    hits.sort_by(|a, b| {
        (Reverse(a.score), a.entry.path.len(), &a.entry.path).cmp(&(
            Reverse(b.score),
            b.entry.path.len(),
            &b.entry.path,
        ))
    });
    hits.truncate(limit);

    log::debug!(
        "Query {:?} ({:?}) -> {} hits",
        terms,
        mode,
        hits.len()
    );
    QueryResult { terms, mode, hits }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(paths: &[&str]) -> IndexSnapshot {
        let mut snapshot = IndexSnapshot::default();
        for path in paths {
            snapshot.entries.insert(
                path.to_string(),
                IndexEntry {
                    path: path.to_string(),
                    is_dir: !path.contains('.'),
                    size: None,
                    modified: None,
                },
            );
        }
        snapshot
    }

    fn paths(result: &QueryResult) -> Vec<&str> {
        result.hits.iter().map(|h| h.entry.path.as_str()).collect()
    }

    #[test]
    fn test_and_match_requires_every_term() {
        let index = snapshot(&["/srv/server/log.txt", "/srv/server/conf", "/var/log"]);

        let result = run_query(&index, "Server LOG", 10);

        assert_eq!(result.mode, MatchMode::All);
        assert_eq!(paths(&result), vec!["/srv/server/log.txt"]);
    }

    #[test]
    fn test_falls_back_to_or_when_no_path_has_all_terms() {
        // --- Setup ---
        let index = snapshot(&[
            "/games/server",
            "/games/server/world",
            "/backup/servers.zip",
            "/home/notes.txt",
        ]);

        // --- Execute ---
        let result = run_query(&index, "server log", 10);

        // --- Assert ---
        assert_eq!(result.mode, MatchMode::Any);
        assert_eq!(
            paths(&result),
            vec!["/games/server", "/games/server/world", "/backup/servers.zip"]
        );
    }

    #[test]
    fn test_exact_segment_beats_prefix_beats_substring() {
        let index = snapshot(&["/a/myserver", "/a/serverless", "/a/server"]);

        let result = run_query(&index, "server", 10);

        assert_eq!(paths(&result), vec!["/a/server", "/a/serverless", "/a/myserver"]);
        let scores: Vec<u32> = result.hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![EXACT_SEGMENT_SCORE, PREFIX_SCORE, SUBSTRING_SCORE]);
    }

    #[test]
    fn test_ties_prefer_shorter_then_lexical_paths() {
        let index = snapshot(&["/b/docs", "/a/docs", "/long/path/docs"]);

        let result = run_query(&index, "docs", 10);

        assert_eq!(paths(&result), vec!["/a/docs", "/b/docs", "/long/path/docs"]);
    }

    #[test]
    fn test_limit_and_empty_queries() {
        let index = snapshot(&["/x/a1", "/x/a2", "/x/a3"]);

        assert_eq!(run_query(&index, "x", 2).hits.len(), 2);
        assert!(run_query(&index, "   ", 10).hits.is_empty());
        assert!(run_query(&index, "x", 0).hits.is_empty());
    }

    #[test]
    fn test_query_terms_are_lowercased_and_deduplicated() {
        assert_eq!(query_terms("Log log  SERVER"), vec!["log", "server"]);
    }
}
