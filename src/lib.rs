pub mod ai;
pub mod apis;
pub mod config;
pub mod feeds;
pub mod logger;
pub mod market;
pub mod pipeline;
pub mod risk;
pub mod shutdown;
pub mod store;
