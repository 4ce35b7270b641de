//! Infrastructure: persistence and retry plumbing

pub mod database;
pub mod retry;
