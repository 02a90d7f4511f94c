pub use crate::{config::*, logging::*, pipeline::*, utils::errors::*};
