pub mod cache;
pub mod config;
pub mod error;
pub mod pagination;
pub mod resolver;
pub mod rickmorty;
pub mod transport;
