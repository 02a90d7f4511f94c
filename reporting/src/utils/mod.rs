pub mod errors;
pub mod html;
