//! File categorization.
//!
//! Maps a path to a coarse [`Category`] and an optional language tag using
//! static extension tables. Special filenames (build recipes, manifests)
//! win over extensions. Everything here is a pure function of the path.

use std::fmt;
use std::path::Path;

/// Coarse file category stored as the `file_category` metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Documentation,
    Code,
    Configuration,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Documentation => "documentation",
            Category::Code => "code",
            Category::Configuration => "configuration",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "documentation" => Some(Category::Documentation),
            "code" => Some(Category::Code),
            "configuration" => Some(Category::Configuration),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SPECIAL_FILES: &[(&str, Category)] = &[
    ("Dockerfile", Category::Code),
    ("Makefile", Category::Code),
    ("Vagrantfile", Category::Code),
    (".gitignore", Category::Configuration),
    (".dockerignore", Category::Configuration),
    ("requirements.txt", Category::Configuration),
    ("package.json", Category::Configuration),
    ("pom.xml", Category::Configuration),
    ("build.gradle", Category::Configuration),
    ("Cargo.toml", Category::Configuration),
    ("go.mod", Category::Configuration),
    ("README", Category::Documentation),
    ("LICENSE", Category::Documentation),
    ("CHANGELOG", Category::Documentation),
];

const DOC_EXTENSIONS: &[&str] = &[".md", ".rst", ".txt", ".adoc", ".asciidoc", ".org"];

const CODE_EXTENSIONS: &[&str] = &[
    ".wdl", ".java", ".py", ".sh", ".js", ".ts", ".jsx", ".tsx", ".go", ".rs", ".c", ".cpp", ".h",
    ".hpp", ".cs", ".rb", ".php", ".scala", ".kt", ".swift", ".r", ".sql",
];

const CONFIG_EXTENSIONS: &[&str] = &[
    ".json",
    ".yaml",
    ".yml",
    ".toml",
    ".ini",
    ".xml",
    ".conf",
    ".config",
    ".properties",
];

const LANGUAGES: &[(&str, &str)] = &[
    (".py", "python"),
    (".java", "java"),
    (".js", "javascript"),
    (".ts", "typescript"),
    (".jsx", "react"),
    (".tsx", "react-typescript"),
    (".wdl", "wdl"),
    (".sh", "bash"),
    (".bash", "bash"),
    (".go", "go"),
    (".rs", "rust"),
    (".c", "c"),
    (".cpp", "cpp"),
    (".h", "c-header"),
    (".hpp", "cpp-header"),
    (".cs", "csharp"),
    (".rb", "ruby"),
    (".php", "php"),
    (".scala", "scala"),
    (".kt", "kotlin"),
    (".swift", "swift"),
    (".r", "r"),
    (".sql", "sql"),
    (".md", "markdown"),
    (".rst", "restructuredtext"),
    (".yaml", "yaml"),
    (".yml", "yaml"),
    (".json", "json"),
    (".xml", "xml"),
];

const MIME_TYPES: &[(&str, &str)] = &[
    (".md", "text/markdown"),
    (".rst", "text/x-rst"),
    (".txt", "text/plain"),
    (".py", "text/x-python"),
    (".java", "text/x-java"),
    (".js", "text/javascript"),
    (".ts", "application/typescript"),
    (".sh", "application/x-sh"),
    (".c", "text/x-c"),
    (".h", "text/x-c"),
    (".cpp", "text/x-c++"),
    (".hpp", "text/x-c++"),
    (".rs", "text/x-rust"),
    (".go", "text/x-go"),
    (".sql", "application/sql"),
    (".json", "application/json"),
    (".yaml", "application/yaml"),
    (".yml", "application/yaml"),
    (".toml", "application/toml"),
    (".xml", "application/xml"),
    (".ini", "text/plain"),
    (".html", "text/html"),
    (".css", "text/css"),
];

/// Lower-cased final suffix including the dot, e.g. `".py"`.
///
/// Dotfiles such as `.gitignore` have no suffix.
pub fn suffix(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Category of a path: special filename, then extension, then `Other`.
pub fn category(path: &Path) -> Category {
    let name = file_name(path);
    if let Some((_, cat)) = SPECIAL_FILES.iter().find(|(n, _)| *n == name) {
        return *cat;
    }

    match suffix(path).as_deref() {
        Some(s) if DOC_EXTENSIONS.contains(&s) => Category::Documentation,
        Some(s) if CODE_EXTENSIONS.contains(&s) => Category::Code,
        Some(s) if CONFIG_EXTENSIONS.contains(&s) => Category::Configuration,
        _ => Category::Other,
    }
}

/// Language tag from the suffix. `None` means the key is omitted.
pub fn language(path: &Path) -> Option<&'static str> {
    let s = suffix(path)?;
    LANGUAGES
        .iter()
        .find(|(ext, _)| *ext == s)
        .map(|(_, lang)| *lang)
}

/// MIME hint from the suffix, `"unknown"` when undetermined.
pub fn mime_type(path: &Path) -> &'static str {
    suffix(path)
        .and_then(|s| MIME_TYPES.iter().find(|(ext, _)| *ext == s))
        .map(|(_, mime)| *mime)
        .unwrap_or("unknown")
}

/// `categorize(path) -> (category, language)`.
pub fn categorize(path: &Path) -> (Category, Option<&'static str>) {
    (category(path), language(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_categories() {
        assert_eq!(category(Path::new("docs/intro.md")), Category::Documentation);
        assert_eq!(category(Path::new("src/main.PY")), Category::Code);
        assert_eq!(category(Path::new("conf/app.yml")), Category::Configuration);
        assert_eq!(category(Path::new("assets/logo.png")), Category::Other);
    }

    #[test]
    fn test_special_files_override_extension() {
        // requirements.txt would be documentation by extension
        assert_eq!(
            category(Path::new("requirements.txt")),
            Category::Configuration
        );
        assert_eq!(category(Path::new("docker/Dockerfile")), Category::Code);
        assert_eq!(category(Path::new("README")), Category::Documentation);
    }

    #[test]
    fn test_language_is_sparse() {
        assert_eq!(language(Path::new("pipeline/main.wdl")), Some("wdl"));
        assert_eq!(language(Path::new("x.tsx")), Some("react-typescript"));
        assert_eq!(language(Path::new("Makefile")), None);
        assert_eq!(language(Path::new("settings.ini")), None);
    }

    #[test]
    fn test_dotfile_has_no_suffix() {
        assert_eq!(suffix(Path::new(".gitignore")), None);
        assert_eq!(category(Path::new(".gitignore")), Category::Configuration);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a.json")), "application/json");
        assert_eq!(mime_type(Path::new("a.wdl")), "unknown");
    }
}
