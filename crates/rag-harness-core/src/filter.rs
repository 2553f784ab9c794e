//! Ingestion eligibility.
//!
//! A [`ContentFilter`] rejects build artifacts, binaries, generated or
//! infrastructure files that are identical across repositories, and files
//! too small to carry meaning. Rejection is never an error: callers simply
//! skip the file.
//!
//! Eligibility does not depend on the file category. A tiny documentation
//! file is dropped exactly like a tiny code file.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};

/// Default minimum trimmed content length, in characters.
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 50;

/// Bytes inspected when sniffing for binary content.
const SNIFF_BYTES: usize = 8192;

const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "target",
    "build",
    "dist",
    ".idea",
    ".vscode",
    "venv",
    ".gradle",
    ".mvn",
    "bin",
    "obj",
    "vendor",
    ".next",
];

/// Generated or infrastructure files. Entries with a `/` match a contiguous
/// run of path segments.
const EXCLUDE_FILES: &[&str] = &[
    "Jenkinsfile",
    ".gitignore",
    ".dockerignore",
    "LICENSE",
    ".gitlab-ci.yml",
    ".travis.yml",
    "circle.yml",
    ".github/workflows",
    "package-lock.json",
    "compare.sh",
];

const BINARY_SUFFIXES: &[&str] = &[
    ".class",
    ".pyc",
    ".pyo",
    ".so",
    ".dll",
    ".dylib",
    ".exe",
    ".bin",
    ".o",
    ".a",
    ".jar",
    ".war",
    ".min.js",
    ".bundle.js",
    ".lock",
    ".log",
];

/// Why a file was rejected. Used for debug logging and run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ExcludedDirectory,
    ExcludedFile,
    BinarySuffix,
    UserGlob,
    BinaryContent,
    TooSmall,
}

/// Decides which files are eligible for ingestion.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    exclude_dirs: Vec<String>,
    exclude_files: Vec<Vec<String>>,
    binary_suffixes: Vec<String>,
    user_globs: Option<GlobSet>,
    min_content_chars: usize,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            exclude_dirs: EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            exclude_files: EXCLUDE_FILES
                .iter()
                .map(|s| s.split('/').map(str::to_string).collect())
                .collect(),
            binary_suffixes: BINARY_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            user_globs: None,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
        }
    }
}

impl ContentFilter {
    pub fn new(min_content_chars: usize, exclude_globs: &[String]) -> Result<Self> {
        let mut filter = Self {
            min_content_chars,
            ..Self::default()
        };
        if !exclude_globs.is_empty() {
            let mut builder = GlobSetBuilder::new();
            for pattern in exclude_globs {
                builder.add(Glob::new(pattern)?);
            }
            filter.user_globs = Some(builder.build()?);
        }
        Ok(filter)
    }

    pub fn min_content_chars(&self) -> usize {
        self.min_content_chars
    }

    /// Path-only checks, so callers can skip reading rejected files.
    /// `path` should be relative to the ingestion root.
    pub fn check_path(&self, path: &Path) -> Result<(), Rejection> {
        let segments: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();

        let (dirs, name) = match segments.split_last() {
            Some((name, dirs)) => (dirs, name.as_str()),
            None => return Err(Rejection::ExcludedFile),
        };

        if dirs.iter().any(|d| self.exclude_dirs.contains(d)) {
            return Err(Rejection::ExcludedDirectory);
        }

        if self
            .exclude_files
            .iter()
            .any(|pattern| contains_run(&segments, pattern))
        {
            return Err(Rejection::ExcludedFile);
        }

        if self.binary_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return Err(Rejection::BinarySuffix);
        }

        if let Some(globs) = &self.user_globs {
            if globs.is_match(path) {
                return Err(Rejection::UserGlob);
            }
        }

        Ok(())
    }

    /// Content checks on the decoded text.
    pub fn check_content(&self, content: &str) -> Result<(), Rejection> {
        if content.trim().chars().count() < self.min_content_chars {
            return Err(Rejection::TooSmall);
        }
        Ok(())
    }

    /// Full check: `is_eligible(path, content)`.
    pub fn check(&self, path: &Path, content: &str) -> Result<(), Rejection> {
        self.check_path(path)?;
        self.check_content(content)
    }

    pub fn is_eligible(&self, path: &Path, content: &str) -> bool {
        self.check(path, content).is_ok()
    }
}

/// True if `haystack` contains `needle` as a contiguous run.
fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Heuristic binary detection: a NUL byte in the leading bytes.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(SNIFF_BYTES).any(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "This body is comfortably longer than the fifty character minimum.";

    #[test]
    fn test_excluded_directories() {
        let f = ContentFilter::default();
        assert_eq!(
            f.check_path(Path::new("node_modules/pkg/index.js")),
            Err(Rejection::ExcludedDirectory)
        );
        assert_eq!(
            f.check_path(Path::new("a/.git/config")),
            Err(Rejection::ExcludedDirectory)
        );
        assert!(f.check_path(Path::new("src/targets.rs")).is_ok());
    }

    #[test]
    fn test_infrastructure_files() {
        let f = ContentFilter::default();
        assert!(!f.is_eligible(Path::new("Jenkinsfile"), BODY));
        assert!(!f.is_eligible(Path::new("sub/LICENSE"), BODY));
        assert!(!f.is_eligible(Path::new(".github/workflows/ci.yml"), BODY));
        // A lone "workflows" directory is fine.
        assert!(f.is_eligible(Path::new("workflows/main.wdl"), BODY));
    }

    #[test]
    fn test_binary_suffixes() {
        let f = ContentFilter::default();
        assert_eq!(
            f.check_path(Path::new("dist2/app.min.js")),
            Err(Rejection::BinarySuffix)
        );
        assert_eq!(
            f.check_path(Path::new("Cargo.lock")),
            Err(Rejection::BinarySuffix)
        );
        assert!(f.check_path(Path::new("app.js")).is_ok());
    }

    #[test]
    fn test_min_content_is_category_independent() {
        let f = ContentFilter::default();
        assert!(!f.is_eligible(Path::new("README.md"), "  # Title\n\n  "));
        assert!(!f.is_eligible(Path::new("main.py"), "print('hi')"));
        assert!(f.is_eligible(Path::new("main.py"), BODY));
    }

    #[test]
    fn test_user_globs() {
        let f = ContentFilter::new(10, &["**/fixtures/**".to_string()]).unwrap();
        assert_eq!(
            f.check_path(Path::new("tests/fixtures/data.json")),
            Err(Rejection::UserGlob)
        );
        assert!(f.is_eligible(Path::new("tests/data.json"), "0123456789ab"));
    }

    #[test]
    fn test_looks_binary() {
        assert!(looks_binary(b"PK\x03\x04\x00\x00"));
        assert!(!looks_binary("plain text".as_bytes()));
    }
}
