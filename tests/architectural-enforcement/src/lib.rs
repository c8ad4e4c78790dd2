//! Architectural Enforcement
//!
//! Source scans that keep the workspace honest:
//! - the orchestration core never blocks its caller
//! - the orchestration core knows nothing about terminals
//!
//! The helpers here walk production sources; the checks live in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// A rule broken on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending code
    pub code: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.code)
    }
}

/// Workspace root, from this crate's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
pub fn source_files(dir: &str) -> Vec<PathBuf> {
    walkdir::WalkDir::new(workspace_root().join(dir))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production code lines of a file, with line numbers
///
/// Comment lines are skipped, trailing comments are cut, and scanning
/// stops at the first `#[cfg(test)]`.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        let code = line.split("//").next().unwrap_or(line);
        if !code.trim().is_empty() {
            lines.push((idx + 1, code));
        }
    }
    lines
}

/// Lines under `dir` containing any of `patterns`
pub fn find_patterns(dir: &str, patterns: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for path in source_files(dir) {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for (line, code) in production_lines(&content) {
            if patterns.iter().any(|p| code.contains(p)) {
                violations.push(Violation {
                    path: path.clone(),
                    line,
                    code: code.trim().to_string(),
                });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_skip_comments_and_tests() {
        let source = "use a;\n// note\nlet x = 1; // trailing\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "use a;"), (3, "let x = 1; ")]);
    }
}
