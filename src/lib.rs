pub mod audits;
pub mod check;
pub mod config;
pub mod geo;
pub mod loader;
pub mod output;
pub mod registry;
pub mod rules;
pub mod scoring;
pub mod stats;
pub mod table;
pub mod validators;
