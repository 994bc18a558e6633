//! Naming of cached formatter binaries.
//!
//! One binary exists per `(version, operating system, architecture)` key. The
//! key determines the artifact's file name inside the cache root, which in
//! turn determines the lock file that installers coordinate on.

use std::fmt;

/// Base artifact name of the published formatter binary.
pub const DEFAULT_ARTIFACT_NAME: &str = "palantir-java-format-native";

/// Operating systems the formatter binary may be built for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OperatingSystem {
    /// Linux with the GNU C library.
    LinuxGlibc,
    /// Linux with musl.
    LinuxMusl,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
}

impl OperatingSystem {
    /// Detects the operating system this process was compiled for.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(all(target_os = "linux", target_env = "musl")) {
            Some(Self::LinuxMusl)
        } else if cfg!(target_os = "linux") {
            Some(Self::LinuxGlibc)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else {
            None
        }
    }

    /// Name used in published artifact classifiers.
    #[must_use]
    pub const fn ui_name(self) -> &'static str {
        match self {
            Self::LinuxGlibc => "linux-glibc",
            Self::LinuxMusl => "linux-musl",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    /// File extension of the executable artifact.
    #[must_use]
    pub const fn executable_extension(self) -> &'static str {
        match self {
            Self::Windows => "exe",
            Self::LinuxGlibc | Self::LinuxMusl | Self::MacOs => "bin",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ui_name())
    }
}

/// CPU architectures the formatter binary may be built for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Architecture {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
}

impl Architecture {
    /// Detects the architecture this process was compiled for.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Self::X86_64)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Aarch64)
        } else {
            None
        }
    }

    /// Name used in published artifact classifiers.
    #[must_use]
    pub const fn ui_name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86-64",
            Self::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ui_name())
    }
}

/// Returns whether a formatter binary is published for the platform.
///
/// Binaries ship for glibc Linux on every architecture and for macOS on
/// aarch64 only.
#[must_use]
pub const fn is_native_supported(os: OperatingSystem, arch: Architecture) -> bool {
    matches!(
        (os, arch),
        (OperatingSystem::LinuxGlibc, _) | (OperatingSystem::MacOs, Architecture::Aarch64)
    )
}

/// Identifies one cached formatter binary.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ArtifactCoordinates {
    name: String,
    version: String,
    os: OperatingSystem,
    arch: Architecture,
}

impl ArtifactCoordinates {
    /// Builds coordinates for an explicit platform.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        os: OperatingSystem,
        arch: Architecture,
    ) -> Self {
        Self {
            name: DEFAULT_ARTIFACT_NAME.to_owned(),
            version: version.into(),
            os,
            arch,
        }
    }

    /// Builds coordinates for the current host, or `None` when the host has
    /// no published binary.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_format_cache::cache::ArtifactCoordinates;
    ///
    /// if let Some(coords) = ArtifactCoordinates::for_host("2.50.0") {
    ///     assert!(coords.file_name().contains("2.50.0"));
    /// }
    /// ```
    #[must_use]
    pub fn for_host(version: impl Into<String>) -> Option<Self> {
        let os = OperatingSystem::host()?;
        let arch = Architecture::host()?;
        is_native_supported(os, arch).then(|| Self::new(version, os, arch))
    }

    /// Overrides the base artifact name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Version component of the key.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Operating system component of the key.
    #[must_use]
    pub const fn os(&self) -> OperatingSystem {
        self.os
    }

    /// Architecture component of the key.
    #[must_use]
    pub const fn arch(&self) -> Architecture {
        self.arch
    }

    /// File name of the cached binary,
    /// `<name>-<version>-nativeImage-<os>_<arch>.<ext>`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-nativeImage-{}_{}.{}",
            self.name,
            self.version,
            self.os.ui_name(),
            self.arch.ui_name(),
            self.os.executable_extension()
        )
    }
}
