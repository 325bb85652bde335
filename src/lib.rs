//! Purpose: Shared library crate used by the `objpath` CLI and embedding hosts.
//! Exports: `api` (engine facade, object model, paths, limits, conversion, errors).
//! Role: Bounded, path-addressable translation between runtime object graphs and JSON-like values.
//! Invariants: `api` is the only public path; internal modules stay private.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
mod core;
mod json;
