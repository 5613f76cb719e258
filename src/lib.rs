pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod http_cache;
pub mod http_client;
pub mod logging;
pub mod model;
pub mod model_store;
pub mod name_match;
pub mod pipeline;
pub mod predict;
pub mod records;
pub mod season;
pub mod sources;
pub mod stats_api;
pub mod teams;
pub mod train;
