//! Purpose: Client library for the document database HTTP protocol.
//! Exports: `api` (commands, executors, operations, store) and `core` (errors, wire values).
//! Role: Backs the `ravendb` CLI and any embedding application.
//! Invariants: All I/O is synchronous and caller-driven; the library spawns no threads.
//! Invariants: The library never installs a tracing subscriber; binaries do.
pub mod api;
pub mod core;
