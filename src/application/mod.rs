pub mod analysis_cache;
pub mod analyzer;
pub mod error;
pub mod flight;
pub mod maintenance;
pub mod proxy;
pub mod repos;
pub mod response_cache;
pub mod upstream;
