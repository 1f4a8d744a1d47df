pub mod common;
pub mod pull;
pub mod status;
pub mod upload;
