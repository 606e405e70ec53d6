//! Commands invoked by the display layer
//!
//! Each command returns `Result<T, String>`: the error string is shown to the
//! user as-is.

mod locks;
mod registry;
mod wallet;

pub use locks::*;
pub use registry::*;
pub use wallet::*;
