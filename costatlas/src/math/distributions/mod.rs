pub mod family;
pub mod fitted;
pub mod fitting;
pub mod gamma;
