//! Purpose: Shared core library crate used by the `equipool` CLI and tests.
//! Exports: `core` (sample extraction, pool planning, well mapping, errors) and `notice`.
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
pub mod notice;
