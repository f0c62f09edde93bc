pub mod error;
pub mod listing;
pub mod repo;
pub mod service;
pub mod status;
