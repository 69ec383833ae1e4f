pub mod download;
pub mod resolve;
pub mod session;
