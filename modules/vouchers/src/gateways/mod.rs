pub mod http;
pub mod local;
