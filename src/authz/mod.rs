pub mod admin;
pub mod applications;
pub mod changes;
pub mod config;
pub mod evaluator;
pub mod index;
