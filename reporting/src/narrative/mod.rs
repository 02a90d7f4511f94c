pub mod local;
pub mod prompt;
pub mod report;
pub mod service;
