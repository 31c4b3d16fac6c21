//! `Fruitshare` - community fruit-tree harvest coordination core
//!
//! Property owners register fruit trees, administrators validate the
//! properties, pick leaders schedule harvests, volunteers request to join
//! them and equipment is borrowed from neighborhood sharing points. This
//! crate implements the harvest and participation state machines, the
//! equipment-reservation engine and the authorization model that gates who
//! may transition what. HTTP rendering, real mail delivery and session
//! handling live in outer collaborators.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    // Security and correctness
    unsafe_code,
    unsafe_op_in_unsafe_fn,

    // Code quality - things that are almost always bugs
    unreachable_code,
    unreachable_patterns,
    unused_must_use,

    // Documentation - broken links are bugs
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// Warn on things that should be fixed but aren't necessarily bugs
#![warn(
    missing_docs,

    // Clippy categories for overall code quality
    clippy::all,
    clippy::pedantic,

    // Correctness
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::exit,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,

    // Style consistency
    clippy::enum_glob_use,
    clippy::inconsistent_struct_constructor,
    clippy::must_use_candidate,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,

    // Future compatibility
    future_incompatible,
    rust_2018_idioms,
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,  // Common pattern in Rust
    clippy::missing_errors_doc,        // Will add gradually
    clippy::missing_panics_doc,        // Will add gradually
)]

/// Family-keyed view cache with wildcard invalidation
pub mod cache;
/// Configuration management for database and application settings
pub mod config;
/// Core business logic - harvest, participation, equipment and member operations
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Notification dispatcher - templated emails behind a `Mailer` seam
pub mod notify;

#[cfg(test)]
pub mod test_utils;
