//! Shared, multi-tenant cache for the formatter binary.
//!
//! The formatter binary is installed once per machine. Build processes that
//! share no in-process state may race to install the same binary at the same
//! path; the installer makes that safe using only the filesystem.
//!
//! # Cache Location
//!
//! The cache directory is resolved in the following order:
//!
//! 1. `NATIVE_FORMAT_CACHE_DIR` environment variable if set
//! 2. `$XDG_CACHE_HOME/native-format/binaries` if `XDG_CACHE_HOME` is set
//! 3. `~/.cache/native-format/binaries` as fallback
//!
//! # Layout
//!
//! One binary per `(version, os, arch)` key, each with a `.lock` sibling:
//!
//! ```text
//! binaries/
//!   palantir-java-format-native-2.50.0-nativeImage-linux-glibc_x86-64.bin
//!   palantir-java-format-native-2.50.0-nativeImage-linux-glibc_x86-64.bin.lock
//! ```
//!
//! # Cross-Process Coordination
//!
//! Installers take an exclusive advisory lock on the `.lock` sibling and
//! publish the binary by renaming a staged copy. Readers that only check for
//! existence never see a partially written binary.

mod config;
mod coordinates;
mod lock;
mod operations;

pub use config::{CACHE_DIR_ENV, CacheConfig, destination_for, resolve_cache_dir};
pub use coordinates::{
    Architecture, ArtifactCoordinates, DEFAULT_ARTIFACT_NAME, OperatingSystem,
    is_native_supported,
};
pub use lock::{InstallLock, lock_path_for};
pub use operations::{
    CacheInstaller, InstallMethod, InstallOutcome, Installation, install, make_executable,
};
