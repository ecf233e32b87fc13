//! File mode: markdown snippets from a user-selected local folder.
//!
//! The folder choice is remembered in a small JSON settings file. On each
//! query the folder is walked, matching files are split on paragraph
//! boundaries, and paragraphs are ranked by how many distinct query terms
//! they contain.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::FilesConfig;
use crate::error::FileModeError;
use crate::models::FileSnippet;

/// Terms shorter than this are ignored when scoring.
const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    local_folder: Option<PathBuf>,
}

pub struct FileHandler {
    settings_path: PathBuf,
    local_folder: Option<PathBuf>,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
    max_results: usize,
    max_chunk_chars: usize,
}

impl FileHandler {
    /// Create a handler, restoring the saved folder if there is one.
    pub fn new(config: &FilesConfig) -> Self {
        let local_folder = match load_settings(&config.settings_path) {
            Ok(settings) => settings.local_folder,
            Err(e) => {
                tracing::warn!(error = %e, "could not read file-mode settings");
                None
            }
        };

        Self {
            settings_path: config.settings_path.clone(),
            local_folder,
            include_globs: config.include_globs.clone(),
            exclude_globs: config.exclude_globs.clone(),
            max_results: config.max_results,
            max_chunk_chars: config.max_chunk_chars,
        }
    }

    pub fn local_folder(&self) -> Option<&Path> {
        self.local_folder.as_deref()
    }

    /// Select `path` as the markdown folder and persist the choice.
    pub fn save_local_folder(&mut self, path: &Path) -> Result<(), FileModeError> {
        if !path.is_dir() {
            return Err(FileModeError::FolderMissing(path.to_path_buf()));
        }

        let settings = Settings {
            local_folder: Some(path.to_path_buf()),
        };
        let json = serde_json::to_string_pretty(&settings)?;

        if let Some(parent) = self
            .settings_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(|source| FileModeError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.settings_path, json).map_err(|source| FileModeError::Io {
            path: self.settings_path.clone(),
            source,
        })?;

        tracing::info!(folder = %path.display(), "file-mode folder saved");
        self.local_folder = Some(path.to_path_buf());
        Ok(())
    }

    /// Paragraphs from the folder's markdown files that share terms with
    /// `query`, best first.
    pub fn find_relevant_markdown_content(
        &self,
        query: &str,
    ) -> Result<Vec<FileSnippet>, FileModeError> {
        let root = self.local_folder.as_ref().ok_or(FileModeError::FolderNotSet)?;
        if !root.is_dir() {
            return Err(FileModeError::FolderMissing(root.clone()));
        }

        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, FileSnippet)> = Vec::new();
        for path in self.scan(root)? {
            let body = match std::fs::read_to_string(&path) {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };

            for chunk in chunk_paragraphs(&body, self.max_chunk_chars) {
                let score = term_overlap(&chunk, &terms);
                if score > 0.0 {
                    scored.push((
                        score,
                        FileSnippet {
                            file_path: path.display().to_string(),
                            content: chunk,
                        },
                    ));
                }
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(self.max_results)
            .map(|(_, snippet)| snippet)
            .collect())
    }

    fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, FileModeError> {
        let include_set = build_globset(&self.include_globs)?;

        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(self.exclude_globs.clone());
        let exclude_set = build_globset(&default_excludes)?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            paths.push(path.to_path_buf());
        }

        // Sort for deterministic ordering
        paths.sort();
        Ok(paths)
    }
}

fn load_settings(path: &Path) -> Result<Settings, FileModeError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(source) => Err(FileModeError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, FileModeError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Distinct lowercase words of at least [`MIN_TERM_CHARS`] characters.
fn query_terms(query: &str) -> BTreeSet<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_TERM_CHARS)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Fraction of `terms` that occur in `text`.
fn term_overlap(text: &str, terms: &BTreeSet<String>) -> f32 {
    let lower = text.to_lowercase();
    let hits = terms.iter().filter(|t| lower.contains(t.as_str())).count();
    hits as f32 / terms.len() as f32
}

/// Split text on blank lines, packing paragraphs up to `max_chars`.
/// Oversized paragraphs are hard-split on a line or word boundary.
fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };
        if would_be > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let mut split_at = remaining.len().min(max_chars);
                while !remaining.is_char_boundary(split_at) {
                    split_at -= 1;
                }
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                // A first char wider than max_chars still has to make progress.
                let actual_split = if actual_split == 0 {
                    remaining.chars().next().map(char::len_utf8).unwrap_or(1)
                } else {
                    actual_split
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
