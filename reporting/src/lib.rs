pub mod charts;
pub mod dashboard;
pub mod narrative;
pub mod prelude;
pub mod summary;
pub mod utils;
