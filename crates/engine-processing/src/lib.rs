pub mod driver;
pub mod error;
pub mod executor;
pub mod logger;
pub mod report;
