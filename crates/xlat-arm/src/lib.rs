#![no_std]

mod desc;
mod mair;
mod ops;

pub use desc::*;
pub use mair::*;
pub use ops::*;
