pub mod budget;
pub mod config;
pub mod decide;
pub mod headers;
pub mod prefetch;
