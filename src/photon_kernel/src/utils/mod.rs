//! Utility
mod init;
mod prio_bitmap;
pub use self::{init::*, prio_bitmap::*};
