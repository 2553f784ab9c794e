//! Strategy-dispatched chunking.
//!
//! [`select_strategy`] inspects a document's metadata and picks one of
//! three [`ChunkStrategy`] variants:
//!
//! - [`ChunkStrategy::Structural`] for workflow-definition files (`.wdl`),
//!   delegated to [`structural::WorkflowParser`];
//! - [`ChunkStrategy::FixedSection`] for glossaries, split on a header
//!   marker only, so each definition stays whole regardless of its size;
//! - [`ChunkStrategy::Generic`] for everything else: a
//!   [`recursive::RecursiveSplitter`] configured by language when a
//!   language-specific separator list exists, else by category.
//!
//! Every emitted [`FragmentCandidate`] carries the document metadata plus
//! `chunk_index`, `total_chunks`, and `chunking_strategy`.

pub mod recursive;
pub mod structural;

use crate::models::{keys, meta_str, FragmentCandidate, MetaValue, Metadata};
use recursive::RecursiveSplitter;
use structural::WorkflowParser;

/// Size, overlap, and separator priority for the generic splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: &'static [&'static str],
}

impl SplitterConfig {
    pub fn with_separators(self, separators: &'static [&'static str]) -> Self {
        Self { separators, ..self }
    }

    pub fn splitter(&self) -> RecursiveSplitter {
        RecursiveSplitter::new(self.chunk_size, self.chunk_overlap, self.separators)
    }
}

pub const DOCUMENTATION: SplitterConfig = SplitterConfig {
    chunk_size: 1500,
    chunk_overlap: 200,
    separators: &["\n## ", "\n### ", "\n#### ", "\n\n", "\n", " "],
};

pub const CODE: SplitterConfig = SplitterConfig {
    chunk_size: 1200,
    chunk_overlap: 150,
    separators: &["\n\nclass ", "\n\ndef ", "\n\nfunction ", "\n\n", "\n"],
};

pub const CONFIGURATION: SplitterConfig = SplitterConfig {
    chunk_size: 800,
    chunk_overlap: 100,
    separators: &["\n\n", "\n"],
};

/// Language-specific separators. Used with the [`CODE`] size settings.
const LANGUAGE_SEPARATORS: &[(&str, &[&str])] = &[
    (
        "python",
        &["\n\nclass ", "\n\ndef ", "\n\nasync def ", "\n\n@", "\n\n", "\n"],
    ),
    (
        "java",
        &["\n\npublic class ", "\n\nclass ", "\n\npublic ", "\n\nprivate ", "\n\n", "\n"],
    ),
    (
        "javascript",
        &["\n\nfunction ", "\n\nconst ", "\n\nlet ", "\n\nclass ", "\n\nexport ", "\n\n", "\n"],
    ),
    (
        "typescript",
        &[
            "\n\nfunction ",
            "\n\nconst ",
            "\n\nlet ",
            "\n\nclass ",
            "\n\nexport ",
            "\n\ninterface ",
            "\n\n",
            "\n",
        ],
    ),
    ("bash", &["\n\nfunction ", "\n\n# ", "\n\n", "\n"]),
    ("sql", &["\n\nCREATE ", "\n\nALTER ", "\n\nSELECT ", "\n\n", ";\n"]),
];

/// Generic config for a category name. Unknown categories use [`CODE`].
pub fn config_for_category(category: &str) -> SplitterConfig {
    match category {
        "documentation" => DOCUMENTATION,
        "configuration" => CONFIGURATION,
        _ => CODE,
    }
}

/// Generic config for a language tag, if one is registered.
pub fn config_for_language(language: &str) -> Option<SplitterConfig> {
    LANGUAGE_SEPARATORS
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, seps)| CODE.with_separators(seps))
}

pub const STRUCTURAL_STRATEGY: &str = "wdl";
pub const GLOSSARY_STRATEGY: &str = "glossary";
pub const GLOSSARY_MARKER: &str = "\n## ";

/// How a document is split.
#[derive(Debug, Clone)]
pub enum ChunkStrategy {
    /// Recursive separator splitting. `name` is recorded as
    /// `chunking_strategy`.
    Generic { name: String, config: SplitterConfig },
    Structural(WorkflowParser),
    /// Split on `marker` only. No size limit, no overlap.
    FixedSection { marker: &'static str },
}

impl ChunkStrategy {
    pub fn name(&self) -> &str {
        match self {
            ChunkStrategy::Generic { name, .. } => name,
            ChunkStrategy::Structural(_) => STRUCTURAL_STRATEGY,
            ChunkStrategy::FixedSection { .. } => GLOSSARY_STRATEGY,
        }
    }

    /// Raw `(text, extra metadata)` pieces, before index bookkeeping.
    fn pieces(&self, content: &str) -> Vec<(String, Metadata)> {
        match self {
            ChunkStrategy::Generic { config, .. } => config
                .splitter()
                .split(content)
                .into_iter()
                .map(|t| (t, Metadata::new()))
                .collect(),
            ChunkStrategy::Structural(parser) => parser.parse(content),
            ChunkStrategy::FixedSection { marker } => split_sections(content, marker)
                .into_iter()
                .map(|t| {
                    let mut m = Metadata::new();
                    m.insert(keys::CHUNK_TYPE.into(), MetaValue::from("glossary_entry"));
                    (t, m)
                })
                .collect(),
        }
    }
}

/// Pick a strategy from document metadata.
///
/// Workflow-definition files win over the glossary rule, which wins over
/// the generic configs.
pub fn select_strategy(metadata: &Metadata) -> ChunkStrategy {
    let language = meta_str(metadata, keys::LANGUAGE);
    let file_type = meta_str(metadata, keys::FILE_TYPE);
    if language == "wdl" || file_type == ".wdl" {
        return ChunkStrategy::Structural(WorkflowParser);
    }

    if meta_str(metadata, keys::FILE_NAME)
        .to_lowercase()
        .contains("glossary")
    {
        return ChunkStrategy::FixedSection {
            marker: GLOSSARY_MARKER,
        };
    }

    let category = match meta_str(metadata, keys::FILE_CATEGORY) {
        "" => "other",
        c => c,
    };
    if !language.is_empty() {
        let config = config_for_language(language).unwrap_or_else(|| config_for_category(category));
        return ChunkStrategy::Generic {
            name: language.to_string(),
            config,
        };
    }
    ChunkStrategy::Generic {
        name: category.to_string(),
        config: config_for_category(category),
    }
}

/// `chunk(content, metadata) -> fragment candidates`.
///
/// Deterministic. Blank content yields no candidates.
pub fn chunk(content: &str, metadata: &Metadata) -> Vec<FragmentCandidate> {
    let strategy = select_strategy(metadata);
    chunk_with(&strategy, content, metadata)
}

/// Chunk with an explicit strategy.
pub fn chunk_with(
    strategy: &ChunkStrategy,
    content: &str,
    metadata: &Metadata,
) -> Vec<FragmentCandidate> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let pieces = strategy.pieces(content);
    let total = pieces.len();

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (text, extra))| {
            let mut m = metadata.clone();
            m.extend(extra);
            m.insert(keys::CHUNK_INDEX.into(), MetaValue::from(i));
            m.insert(keys::TOTAL_CHUNKS.into(), MetaValue::from(total));
            m.insert(
                keys::CHUNKING_STRATEGY.into(),
                MetaValue::from(strategy.name()),
            );
            FragmentCandidate { text, metadata: m }
        })
        .collect()
}

/// Split on `marker`, re-attaching the header prefix to every section but
/// the first. Sections that are blank after trimming are dropped.
fn split_sections(content: &str, marker: &str) -> Vec<String> {
    let prefix = marker.trim_start_matches('\n');
    content
        .split(marker)
        .enumerate()
        .filter_map(|(i, section)| {
            if section.trim().is_empty() {
                return None;
            }
            let text = if i > 0 {
                format!("{}{}", prefix, section)
            } else {
                section.to_string()
            };
            Some(text.trim().to_string())
        })
        .collect()
}
