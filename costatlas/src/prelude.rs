pub use crate::{
    data::{columns::*, dataset::*, exploration::*, loader::*},
    math::{
        distributions::{family::*, fitted::*, fitting::*, gamma::*},
        statistics::*,
    },
    models::{montecarlo::*, results::*, scenario::*},
    risk::{metrics::*, sensitivity::*},
    utils::errors::*,
};
