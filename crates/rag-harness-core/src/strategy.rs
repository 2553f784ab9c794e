//! Retrieval strategy layer.
//!
//! Strategies are pure post-processing policies over a raw, similarity-
//! ordered result list. Each implements [`RetrievalStrategy`]; callers look
//! them up by name with [`strategy_by_name`] or go through
//! [`apply_strategy`].
//!
//! | Name | Behaviour |
//! |------|-----------|
//! | `balanced` | `weighted_score = similarity × category weight`, stable sort descending, truncate |
//! | `code_focused` | first 8 code results + first 2 others, truncate |
//! | `workflow_focused` | first 6 workflow/pipeline results + first 2 others, truncate |
//! | anything else | truncate, original order |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::SearchResult;

/// Weight used by `balanced` for categories missing from the table.
pub const DEFAULT_CATEGORY_WEIGHT: f64 = 0.5;

pub const BALANCED: &str = "balanced";
pub const CODE_FOCUSED: &str = "code_focused";
pub const WORKFLOW_FOCUSED: &str = "workflow_focused";

/// All recognised strategy names.
pub const STRATEGY_NAMES: &[&str] = &[BALANCED, CODE_FOCUSED, WORKFLOW_FOCUSED];

/// `(results, limit) -> results` policy.
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult>;
}

/// Category-weighted rescoring.
#[derive(Debug, Clone)]
pub struct Balanced {
    pub weights: BTreeMap<String, f64>,
    pub default_weight: f64,
}

impl Balanced {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self {
            weights,
            default_weight: DEFAULT_CATEGORY_WEIGHT,
        }
    }

    fn weight(&self, category: &str) -> f64 {
        self.weights
            .get(category)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

impl RetrievalStrategy for Balanced {
    fn name(&self) -> &str {
        BALANCED
    }

    fn apply(&self, mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
        for r in &mut results {
            r.weighted_score = Some(r.similarity * self.weight(r.category()));
        }
        results.sort_by(|a, b| {
            let a = a.weighted_score.unwrap_or(a.similarity);
            let b = b.weighted_score.unwrap_or(b.similarity);
            b.total_cmp(&a)
        });
        results.truncate(limit);
        results
    }
}

/// Take the first `primary_quota` matching results and the first
/// `other_quota` non-matching ones, primaries first, then truncate.
fn partition_take(
    results: Vec<SearchResult>,
    limit: usize,
    primary_quota: usize,
    other_quota: usize,
    is_primary: impl Fn(&SearchResult) -> bool,
) -> Vec<SearchResult> {
    let (primary, other): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| is_primary(r));
    primary
        .into_iter()
        .take(primary_quota)
        .chain(other.into_iter().take(other_quota))
        .take(limit)
        .collect()
}

/// Prefers `file_category == "code"`.
#[derive(Debug, Clone, Copy)]
pub struct CodeFocused {
    pub code_quota: usize,
    pub other_quota: usize,
}

impl Default for CodeFocused {
    fn default() -> Self {
        Self {
            code_quota: 8,
            other_quota: 2,
        }
    }
}

impl RetrievalStrategy for CodeFocused {
    fn name(&self) -> &str {
        CODE_FOCUSED
    }

    fn apply(&self, results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
        partition_take(results, limit, self.code_quota, self.other_quota, |r| {
            r.category() == "code"
        })
    }
}

/// Prefers workflow and pipeline artifacts.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowFocused {
    pub workflow_quota: usize,
    pub other_quota: usize,
}

impl Default for WorkflowFocused {
    fn default() -> Self {
        Self {
            workflow_quota: 6,
            other_quota: 2,
        }
    }
}

/// True when the language tag mentions `wdl` or the source path mentions
/// `workflow`, `pipeline`, or `.wdl` (case-insensitive).
pub fn is_workflow_artifact(result: &SearchResult) -> bool {
    let language = result.language().to_lowercase();
    let file = result.source_file().to_lowercase();
    language.contains("wdl")
        || file.contains("workflow")
        || file.contains("pipeline")
        || file.contains(".wdl")
}

impl RetrievalStrategy for WorkflowFocused {
    fn name(&self) -> &str {
        WORKFLOW_FOCUSED
    }

    fn apply(&self, results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
        partition_take(
            results,
            limit,
            self.workflow_quota,
            self.other_quota,
            is_workflow_artifact,
        )
    }
}

/// Fallback: keep the original order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Truncate;

impl RetrievalStrategy for Truncate {
    fn name(&self) -> &str {
        "truncate"
    }

    fn apply(&self, mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
        results.truncate(limit);
        results
    }
}

/// Build a strategy by name. `weights` only affects `balanced`. Unknown
/// names yield [`Truncate`].
pub fn strategy_by_name(name: &str, weights: &BTreeMap<String, f64>) -> Box<dyn RetrievalStrategy> {
    match name {
        BALANCED => Box::new(Balanced::new(weights.clone())),
        CODE_FOCUSED => Box::new(CodeFocused::default()),
        WORKFLOW_FOCUSED => Box::new(WorkflowFocused::default()),
        other => {
            tracing::debug!(strategy = other, "unknown strategy, truncating");
            Box::new(Truncate)
        }
    }
}

/// `apply_strategy(name, raw_results, limit)` with no category weights.
pub fn apply_strategy(name: &str, results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    strategy_by_name(name, &BTreeMap::new()).apply(results, limit)
}

/// A named bundle of retrieval settings, one per calling agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub strategy: String,
    /// Raw results fetched from the index before the strategy runs.
    pub n_results: usize,
    /// Results kept after the strategy.
    pub limit: usize,
    #[serde(default)]
    pub category_weights: BTreeMap<String, f64>,
}

impl Profile {
    pub fn strategy(&self) -> Box<dyn RetrievalStrategy> {
        strategy_by_name(&self.strategy, &self.category_weights)
    }
}

fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The three stock profiles: `qa_agent`, `code_assistant`, `workflow_agent`.
pub fn builtin_profiles() -> BTreeMap<String, Profile> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "qa_agent".to_string(),
        Profile {
            strategy: BALANCED.into(),
            n_results: 15,
            limit: 5,
            category_weights: weights(&[("documentation", 0.7), ("code", 0.3)]),
        },
    );
    profiles.insert(
        "code_assistant".to_string(),
        Profile {
            strategy: CODE_FOCUSED.into(),
            n_results: 20,
            limit: 10,
            category_weights: weights(&[("code", 0.8), ("documentation", 0.2)]),
        },
    );
    profiles.insert(
        "workflow_agent".to_string(),
        Profile {
            strategy: WORKFLOW_FOCUSED.into(),
            n_results: 15,
            limit: 8,
            category_weights: weights(&[("code", 0.6), ("documentation", 0.4)]),
        },
    );
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{keys, MetaValue, Metadata};

    fn result(id: &str, similarity: f64, category: &str, language: &str, file: &str) -> SearchResult {
        let mut metadata = Metadata::new();
        metadata.insert(keys::FILE_CATEGORY.into(), MetaValue::from(category));
        if !language.is_empty() {
            metadata.insert(keys::LANGUAGE.into(), MetaValue::from(language));
        }
        metadata.insert(keys::SOURCE_FILE.into(), MetaValue::from(file));
        SearchResult {
            id: id.into(),
            content: String::new(),
            metadata,
            similarity,
            weighted_score: None,
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_code_focused_partition_bounds() {
        // interleave 10 code and 10 non-code results
        let mut raw = Vec::new();
        for i in 0..10 {
            raw.push(result(&format!("c{}", i), 0.9, "code", "python", "a.py"));
            raw.push(result(&format!("d{}", i), 0.9, "documentation", "", "a.md"));
        }
        let out = apply_strategy(CODE_FOCUSED, raw, 10);
        assert_eq!(
            ids(&out),
            vec!["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7", "d0", "d1"]
        );
    }

    #[test]
    fn test_code_focused_limit_cuts_others_first() {
        let raw: Vec<_> = (0..10)
            .map(|i| {
                let cat = if i % 2 == 0 { "code" } else { "configuration" };
                result(&i.to_string(), 0.5, cat, "", "x")
            })
            .collect();
        let out = apply_strategy(CODE_FOCUSED, raw, 6);
        // 5 code results exist; the 6th slot goes to the first other
        assert_eq!(ids(&out), vec!["0", "2", "4", "6", "8", "1"]);
    }

    #[test]
    fn test_workflow_focused_detection() {
        let raw = vec![
            result("plain", 0.9, "code", "python", "src/util.py"),
            result("wdl", 0.8, "code", "wdl", "tasks/align.wdl"),
            result("pipe", 0.7, "code", "python", "src/Pipeline_runner.py"),
            result("wf", 0.6, "configuration", "yaml", "workflows/ci.yml"),
            result("doc", 0.5, "documentation", "markdown", "README.md"),
            result("doc2", 0.4, "documentation", "markdown", "USAGE.md"),
        ];
        let out = apply_strategy(WORKFLOW_FOCUSED, raw, 8);
        assert_eq!(ids(&out), vec!["wdl", "pipe", "wf", "plain", "doc"]);
    }

    #[test]
    fn test_workflow_focused_quota() {
        let raw: Vec<_> = (0..10)
            .map(|i| result(&format!("w{}", i), 0.9, "code", "wdl", "main.wdl"))
            .chain((0..10).map(|i| result(&format!("o{}", i), 0.9, "code", "go", "main.go")))
            .collect();
        let out = apply_strategy(WORKFLOW_FOCUSED, raw, 100);
        assert_eq!(out.len(), 8);
        assert_eq!(out[5].id, "w5");
        assert_eq!(out[6].id, "o0");
    }

    #[test]
    fn test_balanced_reweights_by_category() {
        let qa = builtin_profiles().remove("qa_agent").unwrap();
        let raw = vec![
            result("code", 0.9, "code", "python", "a.py"),
            result("doc", 0.6, "documentation", "markdown", "a.md"),
            result("conf", 0.9, "configuration", "yaml", "a.yml"),
        ];
        let out = qa.strategy().apply(raw, 5);
        // doc 0.42, conf 0.45 (default weight), code 0.27
        assert_eq!(ids(&out), vec!["conf", "doc", "code"]);
        assert!((out[0].weighted_score.unwrap() - 0.45).abs() < 1e-9);
        // raw similarity is preserved
        assert_eq!(out[2].similarity, 0.9);
    }

    #[test]
    fn test_balanced_stable_on_ties() {
        let raw = vec![
            result("first", 0.8, "code", "", "a"),
            result("second", 0.8, "code", "", "b"),
        ];
        let out = apply_strategy(BALANCED, raw, 5);
        assert_eq!(ids(&out), vec!["first", "second"]);
    }

    #[test]
    fn test_unknown_strategy_truncates_in_order() {
        let raw = vec![
            result("a", 0.1, "code", "", "a"),
            result("b", 0.9, "code", "", "b"),
            result("c", 0.5, "code", "", "c"),
        ];
        let out = apply_strategy("semantic_magic", raw, 2);
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert!(out.iter().all(|r| r.weighted_score.is_none()));
    }

    #[test]
    fn test_negative_similarity_survives() {
        let raw = vec![result("neg", -0.05, "code", "", "a")];
        let out = apply_strategy(BALANCED, raw, 1);
        assert!(out[0].similarity < 0.0);
    }
}
