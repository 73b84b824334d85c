#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;
pub mod terminal_rest;

pub use server::ApiServer;
