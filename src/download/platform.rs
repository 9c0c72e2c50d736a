//! Host architecture detection for release asset selection

use once_cell::sync::OnceCell;

use crate::error::{InstallResult, InstallerError};

/// CPU architectures the upstream projects publish Linux builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64, // x86_64
    Arm64, // aarch64
    Armv7, // 32-bit arm hard-float
}

/// Global cache for arch detection (initialized once, used everywhere)
static ARCH_CACHE: OnceCell<Arch> = OnceCell::new();

impl Arch {
    /// Detect current architecture (cached after first call)
    pub fn detect() -> InstallResult<Self> {
        ARCH_CACHE
            .get_or_try_init(|| Self::from_parts(std::env::consts::OS, std::env::consts::ARCH))
            .copied()
    }

    fn from_parts(os: &str, arch: &str) -> InstallResult<Self> {
        match (os, arch) {
            ("linux", "x86_64") => Ok(Arch::Amd64),
            ("linux", "aarch64") => Ok(Arch::Arm64),
            ("linux", "arm") => Ok(Arch::Armv7),
            ("linux", arch) => Err(InstallerError::Config(format!(
                "Unsupported Linux architecture: {arch}"
            ))),
            (os, arch) => Err(InstallerError::Config(format!(
                "Unsupported platform: {os} {arch}"
            ))),
        }
    }

    /// Substring of the mediamtx release asset for this arch.
    pub fn mediamtx_asset(&self) -> &'static str {
        match self {
            Arch::Amd64 => "linux_amd64",
            Arch::Arm64 => "linux_arm64",
            Arch::Armv7 => "linux_armv7",
        }
    }

    /// Substring of the ffmpeg-for-homebridge release asset for this arch.
    pub fn ffmpeg_asset(&self) -> &'static str {
        match self {
            Arch::Amd64 => "x86_64",
            Arch::Arm64 => "aarch64",
            Arch::Armv7 => "arm32v7",
        }
    }

    /// File name of the bundled TUTK IOTC library inside the bridge `lib/` dir.
    pub fn iotc_library(&self) -> &'static str {
        match self {
            Arch::Amd64 => "lib.amd64",
            Arch::Arm64 => "lib.arm64",
            Arch::Armv7 => "lib.arm",
        }
    }
}
