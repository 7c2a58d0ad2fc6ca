//! Keyword search and listing over a [`DocumentStore`].
//!
//! Every call re-syncs the store and rescans it from scratch. Matching is
//! a case-insensitive substring test OR-ed across the query's whitespace
//! separated keywords; results keep the store's listing order.
//!
//! The two string-returning operations, [`RetrievalEngine::search`] and
//! [`RetrievalEngine::list_files`], never fail: any error is rendered into
//! the returned text, because the agent calling them has no other channel.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::Result;
use crate::mirror::DocumentStore;

pub const SEARCH_ERROR_PREFIX: &str = "Error searching wiki";
pub const LIST_ERROR_PREFIX: &str = "Error listing wiki files";

const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// One file whose content contained at least one keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: PathBuf,
    /// Full, original-case file content.
    pub content: String,
}

pub struct RetrievalEngine {
    store: Mutex<Box<dyn DocumentStore>>,
}

impl RetrievalEngine {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        let store: Box<dyn DocumentStore> = Box::new(store);
        Self {
            store: Mutex::new(store),
        }
    }

    /// The store lock is held for a whole sync → list → read sequence.
    fn lock(&self) -> MutexGuard<'_, Box<dyn DocumentStore>> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sync, then return every file containing any keyword of `query`.
    ///
    /// Files that fail to read are skipped and count as non-matching.
    pub fn find_matches(&self, query: &str) -> Result<Vec<SearchMatch>> {
        let keywords = keywords(query);
        let mut store = self.lock();

        store.sync()?;
        let files = store.list_files()?;

        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for path in files {
            let content = match store.read_file(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };

            if matches_any(&content, &keywords) {
                matches.push(SearchMatch { path, content });
            }
        }

        debug!(query, keywords = keywords.len(), matches = matches.len(), "search finished");
        Ok(matches)
    }

    /// Sync, then return every document handle.
    pub fn handles(&self) -> Result<Vec<PathBuf>> {
        let mut store = self.lock();
        store.sync()?;
        store.list_files()
    }

    /// Search the wiki and render the result as agent-facing text.
    pub fn search(&self, query: &str) -> String {
        match self.find_matches(query) {
            Ok(matches) if matches.is_empty() => no_results_message(query),
            Ok(matches) => format_matches(&matches),
            Err(e) => format!("{}: {}", SEARCH_ERROR_PREFIX, e),
        }
    }

    /// List every document handle, one per line.
    pub fn list_files(&self) -> String {
        match self.handles() {
            Ok(paths) => paths
                .iter()
                .map(|p| p.to_string_lossy())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("{}: {}", LIST_ERROR_PREFIX, e),
        }
    }
}

/// Lowercased whitespace-separated tokens of `query`, without duplicates.
pub fn keywords(query: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in query.split_whitespace() {
        let token = token.to_lowercase();
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Whether any (already lowercased) keyword occurs in `content`, ignoring case.
pub fn matches_any(content: &str, keywords: &[String]) -> bool {
    let haystack = content.to_lowercase();
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}

pub fn no_results_message(query: &str) -> String {
    format!("No relevant content found for query: {}", query)
}

pub fn format_matches(matches: &[SearchMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("## From {}\n\n{}", m.path.display(), m.content))
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}
