pub mod montecarlo;
pub mod results;
pub mod scenario;
