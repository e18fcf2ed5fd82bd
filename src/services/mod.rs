//! Stores and services behind the admin API.

pub mod asset_deleter;
pub mod identity_store;
pub mod moderation_service;
pub mod photo_store;
pub mod role_service;
pub mod user_store;
