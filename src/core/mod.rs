pub mod config;
pub mod error;
pub mod filters;
pub mod listing;
pub mod paths;
pub mod schema;
