//! Path filtering: built-in excludes, root `.gitignore` and configured deny-globs.

use std::path::{Path, PathBuf};

use ignore::gitignore::Gitignore;
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{Walk, WalkBuilder};

use crate::error::{IndexError, Result};

/// Directory names that are never indexed.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "out",
    "__pycache__",
    ".venv",
    "venv",
    ".pytest_cache",
    ".vscode",
    ".idea",
    "site-packages",
];

pub struct IgnoreMatcher {
    root: PathBuf,
    overrides: Override,
    gitignore: Gitignore,
}

impl std::fmt::Debug for IgnoreMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgnoreMatcher")
            .field("root", &self.root)
            .field("overrides", &self.overrides.num_ignores())
            .field("gitignore", &self.gitignore.num_ignores())
            .finish()
    }
}

impl IgnoreMatcher {
    /// # Errors
    ///
    /// Returns an error if a deny-glob is not a valid glob.
    pub fn new(root: &Path, deny_globs: &[String]) -> Result<Self> {
        let mut builder = OverrideBuilder::new(root);
        for pattern in DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(deny_globs.iter().map(String::as_str))
        {
            builder
                .add(&format!("!{pattern}"))
                .map_err(|e| IndexError::Other(format!("invalid deny glob {pattern:?}: {e}")))?;
        }
        let overrides = builder
            .build()
            .map_err(|e| IndexError::Other(format!("deny globs: {e}")))?;

        let gitignore_path = root.join(".gitignore");
        let gitignore = if gitignore_path.is_file() {
            let (gitignore, err) = Gitignore::new(&gitignore_path);
            if let Some(e) = err {
                tracing::warn!(path = %gitignore_path.display(), error = %e, "partial .gitignore");
            }
            gitignore
        } else {
            Gitignore::empty()
        };

        Ok(Self {
            root: root.to_path_buf(),
            overrides,
            gitignore,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a root-relative path (or any of its parent directories) is excluded.
    #[must_use]
    pub fn is_ignored(&self, rel_path: &Path, is_dir: bool) -> bool {
        let mut first = true;
        for candidate in rel_path.ancestors() {
            if candidate.as_os_str().is_empty() {
                break;
            }
            let candidate_is_dir = if first { is_dir } else { true };
            first = false;
            if self.overrides.matched(candidate, candidate_is_dir).is_ignore() {
                return true;
            }
        }
        self.gitignore
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }

    /// Walk the root in file-name order, pruning excluded directories in place.
    ///
    /// Nested `.gitignore` files are honoured by the walker as it descends.
    #[must_use]
    pub fn walk(&self) -> Walk {
        WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .git_global(false)
            .require_git(false)
            .parents(false)
            .overrides(self.overrides.clone())
            .sort_by_file_name(std::cmp::Ord::cmp)
            .build()
    }
}
