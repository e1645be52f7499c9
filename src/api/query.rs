//! Purpose: Build and run RQL queries with per-query customization hooks.
//! Exports: `DocumentQuery`, `DocumentQueryCustomization`, `QueryOperation`, listener aliases.
//! Role: Thin facade over `QueryCommand`/`StreamQueryCommand` plus three listener registries.
//! Invariants: Before-query listeners see the final `IndexQuery` and may rewrite it.
//! Invariants: After-query listeners run only once a result was decoded.
//! Invariants: Listeners run in registration order; removal takes effect on the next run.
#![allow(clippy::result_large_err)]

use super::command::{IndexQuery, QueryCommand, QueryResult, StreamQueryCommand, TypedCommand};
use super::store::DocumentStore;
use crate::core::conventions::DocumentConventions;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::listeners::{ListenerHandle, ListenerRegistry};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type BeforeQueryExecuted = dyn Fn(&mut IndexQuery) + Send + Sync;
pub type AfterQueryExecuted = dyn Fn(&QueryResult) + Send + Sync;
pub type AfterStreamExecuted = dyn Fn(&Value) + Send + Sync;

#[derive(Clone, Debug, Eq, PartialEq)]
enum RandomOrdering {
    Unseeded,
    Seeded(String),
}

/// Everything needed to send one query, after customization was applied.
#[derive(Clone, Debug)]
pub struct QueryOperation {
    index_query: IndexQuery,
    no_tracking: bool,
    no_caching: bool,
}

impl QueryOperation {
    pub fn index_query(&self) -> &IndexQuery {
        &self.index_query
    }

    pub fn is_no_tracking(&self) -> bool {
        self.no_tracking
    }

    pub fn is_no_caching(&self) -> bool {
        self.no_caching
    }

    pub fn create_command(&self) -> QueryCommand {
        QueryCommand::new(self.index_query.clone()).with_no_caching(self.no_caching)
    }

    pub fn create_stream_command(&self) -> StreamQueryCommand {
        StreamQueryCommand::new(self.index_query.clone())
    }
}

#[derive(Debug)]
pub struct DocumentQuery {
    rql: String,
    parameters: Map<String, Value>,
    conventions: DocumentConventions,
    start: Option<usize>,
    page_size: Option<usize>,
    no_caching: bool,
    no_tracking: bool,
    random: Option<RandomOrdering>,
    wait_timeout: Option<Duration>,
    before_query: ListenerRegistry<BeforeQueryExecuted>,
    after_query: ListenerRegistry<AfterQueryExecuted>,
    after_stream: ListenerRegistry<AfterStreamExecuted>,
}

impl DocumentQuery {
    pub fn new(rql: impl Into<String>, conventions: DocumentConventions) -> Self {
        Self {
            rql: rql.into(),
            parameters: Map::new(),
            conventions,
            start: None,
            page_size: None,
            no_caching: false,
            no_tracking: false,
            random: None,
            wait_timeout: None,
            before_query: ListenerRegistry::new(),
            after_query: ListenerRegistry::new(),
            after_stream: ListenerRegistry::new(),
        }
    }

    /// Binds `$name` in the query text.
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.start = Some(count);
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.page_size = Some(count);
        self
    }

    pub fn customize(&mut self) -> DocumentQueryCustomization<'_> {
        DocumentQueryCustomization { query: self }
    }

    /// Query text as it will be sent, including any random ordering clause.
    ///
    /// The clause joins an existing top-level `order by` or opens one, and is
    /// placed ahead of any trailing `load`/`select`/`include`/`limit`/`offset`.
    pub fn query_text(&self) -> String {
        let Some(random) = &self.random else {
            return self.rql.clone();
        };
        let clause = match random {
            RandomOrdering::Unseeded => "random()".to_string(),
            RandomOrdering::Seeded(seed) => format!("random('{}')", escape_rql_string(seed)),
        };
        let (at, has_order_by) = random_clause_position(&self.rql);
        let (head, tail) = self.rql.split_at(at);
        let joiner = if has_order_by { ", " } else { " order by " };
        format!("{head}{joiner}{clause}{tail}")
    }

    /// Runs before-query listeners against a fresh `IndexQuery`.
    pub fn query_operation(&self) -> QueryOperation {
        let mut index_query = IndexQuery::new(self.query_text());
        index_query.query_parameters = self.parameters.clone();
        index_query.start = self.start;
        index_query.page_size = self.page_size;
        if let Some(timeout) = self.wait_timeout {
            index_query.wait_for_non_stale_results = true;
            index_query.wait_for_non_stale_results_timeout = Some(timeout);
        }
        self.before_query
            .invoke_all(|listener| listener(&mut index_query));
        QueryOperation {
            index_query,
            no_tracking: self.no_tracking,
            no_caching: self.no_caching,
        }
    }

    pub fn execute(&self, store: &DocumentStore) -> ApiResult<QueryResult> {
        let operation = self.query_operation();
        debug!(query = %operation.index_query().query, "executing query");
        let mut command = operation.create_command();
        store.execute(&mut command)?;
        let result = command.into_result().ok_or_else(|| {
            Error::new(ErrorKind::Decode).with_message("query returned no result")
        })?;
        self.after_query.invoke_all(|listener| listener(&result));
        Ok(result)
    }

    /// Streams every matching document; after-stream callbacks see each one.
    pub fn stream(&self, store: &DocumentStore) -> ApiResult<Vec<Value>> {
        let operation = self.query_operation();
        debug!(query = %operation.index_query().query, "streaming query");
        let mut command = operation.create_stream_command();
        store.execute(&mut command)?;
        let results = command.into_result().unwrap_or_default();
        for document in &results {
            self.after_stream.invoke_all(|callback| callback(document));
        }
        Ok(results)
    }
}

/// Mutable view used to tune a query before it runs.
pub struct DocumentQueryCustomization<'a> {
    query: &'a mut DocumentQuery,
}

impl DocumentQueryCustomization<'_> {
    pub fn query_operation(&self) -> QueryOperation {
        self.query.query_operation()
    }

    pub fn add_before_query_executed_listener<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: Fn(&mut IndexQuery) + Send + Sync + 'static,
    {
        self.query.before_query.add(Arc::new(listener))
    }

    pub fn remove_before_query_executed_listener(&mut self, handle: ListenerHandle) -> &mut Self {
        self.query.before_query.remove(handle);
        self
    }

    pub fn add_after_query_executed_listener<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: Fn(&QueryResult) + Send + Sync + 'static,
    {
        self.query.after_query.add(Arc::new(listener))
    }

    pub fn remove_after_query_executed_listener(&mut self, handle: ListenerHandle) -> &mut Self {
        self.query.after_query.remove(handle);
        self
    }

    pub fn add_after_stream_executed_callback<F>(&mut self, callback: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.query.after_stream.add(Arc::new(callback))
    }

    pub fn remove_after_stream_executed_callback(&mut self, handle: ListenerHandle) -> &mut Self {
        self.query.after_stream.remove(handle);
        self
    }

    pub fn no_caching(&mut self) -> &mut Self {
        self.query.no_caching = true;
        self
    }

    /// Results are not kept for change tracking.
    pub fn no_tracking(&mut self) -> &mut Self {
        self.query.no_tracking = true;
        self
    }

    pub fn random_ordering(&mut self) -> &mut Self {
        self.query.random = Some(RandomOrdering::Unseeded);
        self
    }

    /// Same seed, same order.
    pub fn random_ordering_with_seed(&mut self, seed: impl Into<String>) -> &mut Self {
        self.query.random = Some(RandomOrdering::Seeded(seed.into()));
        self
    }

    /// `None` or a zero duration uses the conventions' default timeout.
    pub fn wait_for_non_stale_results(&mut self, timeout: Option<Duration>) -> &mut Self {
        let timeout = timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| self.query.conventions.wait_for_non_stale_results_timeout());
        self.query.wait_timeout = Some(timeout);
        self
    }
}

/// Clauses that follow `order by` in RQL.
const TRAILING_CLAUSES: [&str; 5] = ["load", "select", "include", "limit", "offset"];

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'@' | b'$') || !byte.is_ascii()
}

fn word_at(text: &str, start: usize) -> &str {
    let len = text.as_bytes()[start..]
        .iter()
        .take_while(|byte| is_word_byte(**byte))
        .count();
    &text[start..start + len]
}

/// Byte offset where the random clause goes, and whether a top-level
/// `order by` precedes it. Quoted literals and bracketed groups are skipped.
fn random_clause_position(rql: &str) -> (usize, bool) {
    let bytes = rql.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut has_order_by = false;
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if let Some(open) = quote {
            if byte == b'\\' {
                i += 2;
                continue;
            }
            if byte == open {
                quote = None;
            }
            i += 1;
            continue;
        }
        match byte {
            b'\'' | b'"' => quote = Some(byte),
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => depth = depth.saturating_sub(1),
            _ if depth == 0 && is_word_byte(byte) && (i == 0 || !is_word_byte(bytes[i - 1])) => {
                let word = word_at(rql, i);
                if word.eq_ignore_ascii_case("order") {
                    let rest = &rql[i + word.len()..];
                    let next = rest.trim_start();
                    if !next.is_empty() && rest.len() != next.len() {
                        let offset = rql.len() - next.len();
                        if word_at(rql, offset).eq_ignore_ascii_case("by") {
                            has_order_by = true;
                        }
                    }
                } else if TRAILING_CLAUSES
                    .iter()
                    .any(|clause| word.eq_ignore_ascii_case(clause))
                {
                    return (rql[..i].trim_end().len(), has_order_by);
                }
                i += word.len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    (rql.trim_end().len(), has_order_by)
}

fn escape_rql_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}
