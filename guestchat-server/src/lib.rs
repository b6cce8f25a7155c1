//! `GuestChat` reference backend library.
//!
//! Exposes the REST server for use in tests and embedding. The server keeps
//! one conversation per device in memory, serves the guest endpoints the
//! client polls and posts to, and offers a minimal support-side surface
//! (reply, block, unblock).

pub mod config;
pub mod limiter;
pub mod server;
pub mod store;
