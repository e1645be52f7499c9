//! Purpose: Read-only client configuration threaded into command construction.
//! Exports: `DocumentConventions`.
//! Role: Decides collection names, id prefixes, and query defaults.
//! Invariants: Never mutated by commands or operations; callers pass it explicitly.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type NameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct DocumentConventions {
    identity_parts_separator: char,
    wait_for_non_stale_results_timeout: Duration,
    database_names_page_size: usize,
    find_collection_name: Option<NameFn>,
}

impl DocumentConventions {
    pub fn new() -> Self {
        Self {
            identity_parts_separator: '/',
            wait_for_non_stale_results_timeout: Duration::from_secs(15),
            database_names_page_size: 32,
            find_collection_name: None,
        }
    }

    pub fn with_identity_parts_separator(mut self, separator: char) -> Self {
        self.identity_parts_separator = separator;
        self
    }

    pub fn with_wait_for_non_stale_results_timeout(mut self, timeout: Duration) -> Self {
        self.wait_for_non_stale_results_timeout = timeout;
        self
    }

    pub fn with_database_names_page_size(mut self, page_size: usize) -> Self {
        self.database_names_page_size = page_size;
        self
    }

    /// Overrides how a type name maps to its collection.
    pub fn with_find_collection_name<F>(mut self, find: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.find_collection_name = Some(Arc::new(find));
        self
    }

    pub fn identity_parts_separator(&self) -> char {
        self.identity_parts_separator
    }

    pub fn wait_for_non_stale_results_timeout(&self) -> Duration {
        self.wait_for_non_stale_results_timeout
    }

    pub fn database_names_page_size(&self) -> usize {
        self.database_names_page_size
    }

    pub fn find_collection_name(&self, type_name: &str) -> String {
        match &self.find_collection_name {
            Some(find) => find(type_name),
            None => pluralize(type_name),
        }
    }

    /// `User` -> `users/`; the server completes the id.
    pub fn document_id_prefix(&self, type_name: &str) -> String {
        let collection = self.find_collection_name(type_name).to_lowercase();
        format!("{collection}{}", self.identity_parts_separator)
    }
}

impl Default for DocumentConventions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentConventions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentConventions")
            .field("identity_parts_separator", &self.identity_parts_separator)
            .field(
                "wait_for_non_stale_results_timeout",
                &self.wait_for_non_stale_results_timeout,
            )
            .field("database_names_page_size", &self.database_names_page_size)
            .field(
                "find_collection_name",
                &self.find_collection_name.as_ref().map(|_| "custom"),
            )
            .finish()
    }
}

fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{name}es");
    }
    if let Some(stem) = name.strip_suffix('y').or_else(|| name.strip_suffix('Y')) {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiouAEIOU".contains(c)) {
            return format!("{stem}ies");
        }
    }
    format!("{name}s")
}
