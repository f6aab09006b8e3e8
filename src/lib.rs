pub mod authn;
pub mod authz;
pub mod catalog;
pub mod cmd;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod guard;
pub mod logs;
pub mod server;
pub mod settings;
pub mod types;
