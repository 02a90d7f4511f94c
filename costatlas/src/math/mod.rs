pub mod distributions;
pub mod statistics;
