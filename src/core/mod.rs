//! Domain operations, grouped by concern.
//!
//! Each submodule holds async free functions operating on a
//! [`sea_orm::DatabaseConnection`]. Multi-row mutations run inside a
//! transaction; cache invalidation and notifications happen after commit.

pub mod auth;
pub mod equipment;
pub mod feed;
pub mod harvest;
pub mod member;
pub mod onboarding;
pub mod participation;
pub mod property;
pub mod tree;
