pub(crate) mod prelude;

pub mod nevra;
pub mod modules;

pub use nevra::*;
pub use modules::*;
