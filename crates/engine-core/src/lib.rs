pub mod blob;
pub mod error;
pub mod retry;
pub mod sink;
pub mod state;
