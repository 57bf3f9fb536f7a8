//! TEKKI Studio admin gate library
//!
//! Session gating for the admin login page and the administrator role check
//! used by protected API handlers. The binary entry point is in main.rs.

pub mod admin;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod identity;
pub mod server;
mod sql;
