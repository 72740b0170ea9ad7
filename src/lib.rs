//! Purpose: `mango` library crate: a C-linkage boundary over a corpus-query engine.
//! Exports: `abi` (C surface), `boundary` (typed Rust surface), `engine`, `config`,
//! `core` (errors, handles, fault guard), `freqs`, `info`, `logging`.
//! Role: Backs `libmango` (cdylib/staticlib) and the `mango` CLI.
//! Invariants: Engine objects are only reachable through boundary handles.
//! Invariants: No panic unwinds out of a boundary call.
pub mod abi;
pub mod boundary;
pub mod config;
pub mod core;
pub mod engine;
pub mod freqs;
pub mod info;
pub mod logging;
