pub mod columns;
pub mod dataset;
pub mod exploration;
pub mod loader;
