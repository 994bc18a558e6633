//! Cache installation operations.
//!
//! Provides the locked, staged install of a formatter binary and the
//! permission helper callers use to make a download executable.

mod executable;
mod install;
mod stage;

pub use executable::make_executable;
pub use install::{CacheInstaller, InstallMethod, InstallOutcome, Installation, install};
