pub mod numerics;
pub mod sensors;
pub mod slam;
pub mod io;

macro_rules! define_float {
    ($f:tt) => {
        pub use std::$f as float;
        pub type Float = $f;
    }
}

define_float!(f64);

pub use color_eyre::eyre::Result;
