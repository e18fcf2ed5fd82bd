//! Core data models for the moderation service.
//!
//! Rows map to SQLite tables via `sqlx::FromRow`; the DTOs serialize as the
//! JSON the admin frontend consumes.

pub mod photo;
pub mod user;
