pub use crate::{
    charts::{data::*, render::*},
    dashboard::*,
    narrative::{local::*, prompt::*, report::*, service::*},
    summary::*,
    utils::{errors::*, html::*},
};
