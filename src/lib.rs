pub mod client;
pub mod config;
pub mod datasvc;
pub mod directory;
pub mod error;
pub mod filestore;
pub mod identity;
pub mod security;
pub mod server;
