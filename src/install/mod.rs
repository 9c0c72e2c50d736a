//! Filesystem installation and environment provisioning
//!
//! ## Module Organization
//!
//! - `prerequisites` - Root, python and connectivity checks
//! - `account` - Service account lookup and creation
//! - `bridge` - docker-wyze-bridge application directory
//! - `mediamtx` - Media relay binary
//! - `ffmpeg` - Transcoder static build
//! - `pyenv` - Python virtual environment
//! - `backup` - Pre-update archives
//! - `env_file` - `KEY=value` file editing
//! - `file_ops` - Atomic writes, modes, ownership
//! - `command` - Subprocess execution with timeouts

pub mod account;
pub mod backup;
pub mod bridge;
pub mod command;
pub mod env_file;
pub mod ffmpeg;
pub mod file_ops;
pub mod mediamtx;
pub mod prerequisites;
pub mod pyenv;

use std::path::{Path, PathBuf};

use crate::config::Settings;
use account::ServiceAccount;
use bridge::BridgeApp;
use mediamtx::MediaMtx;
use pyenv::VirtualEnv;

/// Snapshot images written by the bridge.
pub const IMG_DIR: &str = "/img";
/// Cached Wyze API tokens.
pub const TOKENS_DIR: &str = "/tokens";
/// Where the bridge's `ctypes` loader expects the TUTK library.
pub const IOTC_LIBRARY: &str = "/usr/local/lib/libIOTCAPIs_ALL.so";

const VENV_DIR: &str = ".wyze-venv";
const BACKUP_DIR: &str = "wyze-backups";

/// Every on-disk location an installation touches.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    pub bridge: BridgeApp,
    pub relay: MediaMtx,
    pub venv: VirtualEnv,
    pub app_conf: PathBuf,
    pub backups: PathBuf,
    pub img: PathBuf,
    pub tokens: PathBuf,
    pub iotc_library: PathBuf,
}

impl InstallLayout {
    pub fn new(settings: &Settings, account: &ServiceAccount) -> Self {
        Self {
            bridge: BridgeApp::new(&settings.app_path),
            relay: MediaMtx::new(&settings.media_mtx_path),
            venv: VirtualEnv::new(account.home.join(VENV_DIR)),
            app_conf: settings.app_conf.clone(),
            backups: account.home.join(BACKUP_DIR),
            img: PathBuf::from(IMG_DIR),
            tokens: PathBuf::from(TOKENS_DIR),
            iotc_library: PathBuf::from(IOTC_LIBRARY),
        }
    }

    /// Folders created for and owned by the service account.
    pub fn owned_folders(&self) -> Vec<&Path> {
        vec![
            self.bridge.path(),
            self.relay.dir(),
            self.img.as_path(),
            self.tokens.as_path(),
        ]
    }
}
