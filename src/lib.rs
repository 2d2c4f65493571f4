pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod session;
pub mod validate;
