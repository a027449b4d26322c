//! HTTP handlers for the synthesized operations and the capability layer around them.

pub mod capabilities;
pub mod operation;
pub use capabilities::*;
pub use operation::*;
