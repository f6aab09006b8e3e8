mod context;
mod handlers;
mod response;

pub mod config;
pub mod factory;
pub mod restful;
