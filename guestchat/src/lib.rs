//! `GuestChat` -- guest support chat client library.

pub mod api;
pub mod app;
pub mod chat;
pub mod config;
pub mod identity;
pub mod notify;
pub mod storage;
pub mod ui;
