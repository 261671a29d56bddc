use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tantivy::{
    collector::{Count, TopDocs},
    query::{Query, QueryParser},
    schema::Field,
};

use crate::{
    error::{Error, Result},
    tantivy_index::{IndexService, SchemaFields, Snapshot},
};

/// Matches in the file name count double.
const FILENAME_BOOST: f32 = 2.0;

/// Fields searched when a query term has no field prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Filename,
    Content,
}

impl SearchField {
    fn resolve(self, fields: &SchemaFields) -> Field {
        match self {
            SearchField::Filename => fields.filename,
            SearchField::Content => fields.content,
        }
    }
}

pub const DEFAULT_FIELDS: &[SearchField] =
    &[SearchField::Filename, SearchField::Content];

/// One ranked hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub path: String,
    pub filename: String,
    pub modified_at: DateTime<Utc>,
    pub score: f32,
}

/// Search the last committed state of the index.
///
/// Terms without a field prefix are matched against `fields`, any of
/// them being enough for a document to match. Results are ordered by
/// descending score, then most recently modified, then path, and capped
/// at `max_results`.
pub fn search(
    index: &IndexService,
    query_text: &str,
    fields: &[SearchField],
    max_results: usize,
) -> Result<Vec<ScoredResult>> {
    if max_results == 0 || query_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query = parse_query(index, query_text, fields)?;
    let snapshot = index.open_reader()?;
    top_results(&snapshot, query.as_ref(), max_results)
}

/// Parse `query_text` with the index's analyzer.
///
/// Supports terms, `"phrases"`, `AND`/`OR`/`NOT`, `+`/`-` and
/// `field:term` prefixes. Malformed input is reported as
/// [`Error::QuerySyntax`].
pub fn parse_query(
    index: &IndexService,
    query_text: &str,
    fields: &[SearchField],
) -> Result<Box<dyn Query>> {
    let f = index.fields();
    let default_fields = fields.iter().map(|sf| sf.resolve(&f)).collect();

    let mut parser = QueryParser::for_index(index.index(), default_fields);
    parser.set_field_boost(f.filename, FILENAME_BOOST);

    parser
        .parse_query(&rewrite_not(query_text))
        .map_err(|e| Error::QuerySyntax {
            query: query_text.to_string(),
            message: e.to_string(),
        })
}

/// Rewrite `NOT clause` into the `-clause` form the parser understands.
/// Quoted phrases are left untouched.
fn rewrite_not(query_text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut negate_next = false;
    for token in split_outside_quotes(query_text) {
        if token == "NOT" && !negate_next {
            negate_next = true;
        } else if negate_next {
            out.push(format!("-{token}"));
            negate_next = false;
        } else {
            out.push(token);
        }
    }
    if negate_next {
        out.push("NOT".to_string());
    }
    out.join(" ")
}

fn split_outside_quotes(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn top_results(
    snapshot: &Snapshot,
    query: &dyn Query,
    k: usize,
) -> Result<Vec<ScoredResult>> {
    let searcher = snapshot.searcher();

    // Widen the window until every hit scoring the same as the k-th one
    // is in it, so the tie-break below sees all candidates.
    let mut limit = k;
    let hits = loop {
        let (total, hits) =
            searcher.search(query, &(Count, TopDocs::with_limit(limit)))?;
        let complete = hits.len() >= total
            || match (hits.get(k - 1), hits.last()) {
                (Some(kth), Some(last)) => last.0 < kth.0,
                _ => true,
            };
        if complete {
            break hits;
        }
        limit = limit.saturating_mul(2);
    };

    let mut results = Vec::with_capacity(hits.len());
    for (score, address) in hits {
        let doc = snapshot.load(address)?;
        results.push(ScoredResult {
            path: doc.path,
            filename: doc.filename,
            modified_at: doc.modified_at,
            score,
        });
    }

    results.sort_by(rank_order);
    results.truncate(k);
    Ok(results)
}

fn rank_order(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.modified_at.cmp(&a.modified_at))
        .then_with(|| a.path.cmp(&b.path))
}

/// Render results for the terminal.
pub fn format_results(results: &[ScoredResult]) -> String {
    let mut out = format!("Found {} results:\n", results.len());
    for r in results {
        out.push_str(&format!(
            "- {} (Modified: {}) - Score: {:.2}\n",
            r.filename,
            r.modified_at.format("%Y-%m-%d %H:%M:%S UTC"),
            r.score
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tantivy_index::tests::{make_doc, test_options};

    fn index_with(docs: &[(&str, &str, i64)]) -> IndexService {
        let idx = IndexService::open_in_ram(&test_options()).unwrap();
        for (path, content, ms) in docs {
            idx.upsert(&make_doc(path, content, *ms)).unwrap();
        }
        idx.commit().unwrap();
        idx
    }

    fn paths(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn single_term_match() {
        let idx = index_with(&[
            ("/d/a.txt", "invoice 2024 total", 1),
            ("/d/b.txt", "meeting notes", 2),
        ]);

        let results = search(&idx, "invoice", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&results), vec!["/d/a.txt"]);
        assert_eq!(results[0].filename, "a.txt");
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn or_returns_both_ranked() {
        let idx = index_with(&[
            ("/d/a.txt", "invoice 2024 total", 1),
            ("/d/b.txt", "meeting notes", 2),
        ]);

        let results =
            search(&idx, "notes OR invoice", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn terms_are_disjunctive_by_default() {
        let idx = index_with(&[
            ("/d/a.txt", "alpha beta", 1),
            ("/d/b.txt", "alpha", 2),
            ("/d/c.txt", "gamma", 3),
        ]);

        let results = search(&idx, "alpha beta", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&results), vec!["/d/a.txt", "/d/b.txt"]);
    }

    #[test]
    fn boolean_and_not_and_phrase() {
        let idx = index_with(&[
            ("/d/a.txt", "quarterly budget review", 1),
            ("/d/b.txt", "budget quarterly", 2),
            ("/d/c.txt", "budget draft", 3),
        ]);

        let and = search(&idx, "budget AND draft", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&and), vec!["/d/c.txt"]);

        let not = search(&idx, "budget NOT draft", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(not.len(), 2);
        assert!(!paths(&not).contains(&"/d/c.txt"));

        let phrase =
            search(&idx, "\"quarterly budget\"", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&phrase), vec!["/d/a.txt"]);
    }

    #[test]
    fn field_prefix_restricts_match() {
        let idx = index_with(&[
            ("/d/budget.txt", "nothing relevant", 1),
            ("/d/other.txt", "budget inside", 2),
        ]);

        let by_name =
            search(&idx, "filename:budget", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&by_name), vec!["/d/budget.txt"]);

        let by_content =
            search(&idx, "budget", &[SearchField::Content], 20).unwrap();
        assert_eq!(paths(&by_content), vec!["/d/other.txt"]);
    }

    #[test]
    fn filename_matches_rank_higher() {
        let idx = index_with(&[
            ("/d/rust.txt", "guide to the language", 1),
            ("/d/guide.txt", "rust guide to the language", 2),
        ]);

        let results = search(&idx, "rust", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(results[0].path, "/d/rust.txt");
    }

    #[test]
    fn empty_content_found_by_filename() {
        let idx = index_with(&[("/d/scanned-contract.pdf", "", 1)]);

        let results = search(&idx, "contract", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&results), vec!["/d/scanned-contract.pdf"]);
    }

    #[test]
    fn higher_term_frequency_scores_at_least_as_high() {
        let idx = index_with(&[
            ("/d/one.txt", "report report report report report", 1),
            ("/d/two.txt", "report alpha beta gamma delta", 1),
        ]);

        let results = search(&idx, "report", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(results.len(), 2);
        let score = |p: &str| results.iter().find(|r| r.path == p).unwrap().score;
        assert!(score("/d/one.txt") >= score("/d/two.txt"));
    }

    #[test]
    fn result_cap() {
        let idx = IndexService::open_in_ram(&test_options()).unwrap();
        for i in 0..100 {
            let content = "invoice ".repeat(i % 5 + 1);
            idx.upsert(&make_doc(&format!("/d/{i:03}.txt"), &content, i as i64))
                .unwrap();
        }
        idx.commit().unwrap();

        let results = search(&idx, "invoice", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(results.len(), 20);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn ties_break_on_modified_then_path() {
        let idx = index_with(&[
            ("/d/b.txt", "budget", 10),
            ("/d/a.txt", "budget", 10),
            ("/d/c.txt", "budget", 30),
        ]);

        let results = search(&idx, "budget", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&results), vec!["/d/c.txt", "/d/a.txt", "/d/b.txt"]);
    }

    #[test]
    fn ties_across_the_cut_keep_newest() {
        let idx = IndexService::open_in_ram(&test_options()).unwrap();
        for i in 0..30 {
            idx.upsert(&make_doc(&format!("/d/{i:02}.txt"), "budget", i))
                .unwrap();
        }
        idx.commit().unwrap();

        let results = search(&idx, "budget", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(results.len(), 20);
        assert_eq!(results[0].path, "/d/29.txt");
        assert_eq!(results[19].path, "/d/10.txt");
    }

    #[test]
    fn replaced_content_is_not_matchable() {
        let idx = index_with(&[("/d/a.txt", "invoice 2024 total", 1)]);
        idx.upsert(&make_doc("/d/a.txt", "archived", 2)).unwrap();
        idx.commit().unwrap();

        assert!(search(&idx, "invoice", DEFAULT_FIELDS, 20).unwrap().is_empty());
        let archived = search(&idx, "archived", DEFAULT_FIELDS, 20).unwrap();
        assert_eq!(paths(&archived), vec!["/d/a.txt"]);
    }

    #[test]
    fn malformed_query_is_reported() {
        let idx = index_with(&[("/d/a.txt", "hello", 1)]);

        let err = search(&idx, "nosuchfield:hello", DEFAULT_FIELDS, 20)
            .unwrap_err();
        assert!(matches!(err, Error::QuerySyntax { .. }));
        // the index is still usable afterwards
        assert_eq!(search(&idx, "hello", DEFAULT_FIELDS, 20).unwrap().len(), 1);
    }

    #[test]
    fn not_is_rewritten_outside_phrases() {
        assert_eq!(rewrite_not("budget NOT draft"), "budget -draft");
        assert_eq!(rewrite_not("a AND NOT (b OR c)"), "a AND -(b OR c)");
        assert_eq!(rewrite_not("\"NOT   this\" x"), "\"NOT   this\" x");
        assert_eq!(rewrite_not("trailing NOT"), "trailing NOT");
    }

    #[test]
    fn zero_limit_and_blank_query() {
        let idx = index_with(&[("/d/a.txt", "hello", 1)]);
        assert!(search(&idx, "hello", DEFAULT_FIELDS, 0).unwrap().is_empty());
        assert!(search(&idx, "   ", DEFAULT_FIELDS, 20).unwrap().is_empty());
    }

    #[test]
    fn format_lists_filename_date_and_score() {
        let results = vec![ScoredResult {
            path: "/d/a.txt".into(),
            filename: "a.txt".into(),
            modified_at: crate::document::from_millis(1_704_067_200_000),
            score: 1.23456,
        }];
        assert_eq!(
            format_results(&results),
            "Found 1 results:\n- a.txt (Modified: 2024-01-01 00:00:00 UTC) - Score: 1.23\n"
        );
    }
}
