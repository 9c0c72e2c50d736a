//! GitHub release lookup, artifact download and archive extraction
//!
//! ## Module Organization
//!
//! - `platform` - Host architecture detection and asset naming
//! - `github` - GitHub API interaction for release discovery
//! - `release` - Component registry and version resolution
//! - `core` - Download with progress tracking and digest checks
//! - `extract` - `.tar.gz` extraction with filtering

mod core;
mod extract;
mod github;
mod platform;
mod release;

pub use self::core::{download, http_client};
pub use extract::{ExtractFilter, unpack};
pub use platform::Arch;
pub use release::{Component, ReleaseRef, normalize_tag, resolve};

#[cfg(test)]
pub(crate) use extract::tests::tar_gz;
