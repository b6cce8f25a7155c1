//! Shared wire definitions for the guest chat REST API.

pub mod api;
pub mod message;
