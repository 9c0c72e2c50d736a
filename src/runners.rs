//! Top-level runners for the `install`, `update` and `show-settings` actions.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::cli::{Action, Cli};
use crate::config::{LATEST, Settings, SettingsOverrides};
use crate::download::{self, Arch, Component};
use crate::install::account::{ServiceAccount, ensure_service_account};
use crate::install::bridge::{install_iotc_library, write_app_env_template};
use crate::install::file_ops::{create_application_folders, give_to};
use crate::install::pyenv::VirtualEnv;
use crate::install::{InstallLayout, backup, env_file, ffmpeg, prerequisites, pyenv};
use crate::service::{FrontEnd, InitSystem, UnitSpec};

/// Write one colored line and reset.
fn say(out: &mut impl WriteColor, color: Color, bold: bool, msg: &str) {
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = writeln!(out, "{msg}");
    let _ = out.reset();
}

/// Command-line overrides adjusted for the action.
///
/// `update` targets the latest bridge release unless a version is given on
/// the command line; a version pinned by an earlier install is not reused.
pub fn effective_overrides(cli: &Cli) -> SettingsOverrides {
    let mut overrides = cli.overrides();
    if cli.action == Action::Update && overrides.app_version.is_none() {
        overrides.app_version = Some(LATEST.to_string());
    }
    overrides
}

/// Entry point for a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let settings =
        Settings::resolve(&effective_overrides(&cli)).context("Failed to load installer settings")?;

    match cli.action {
        Action::ShowSettings => {
            let mut stdout = StandardStream::stdout(ColorChoice::Auto);
            show_settings(&settings, &mut stdout).context("Failed to print settings")
        }
        Action::Install => {
            let init = preflight().await?;
            run_install(&settings, init).await
        }
        Action::Update => {
            let init = preflight().await?;
            run_update(&settings, init).await
        }
    }
}

/// Print every setting with its description. Read-only.
pub fn show_settings(settings: &Settings, out: &mut impl WriteColor) -> io::Result<()> {
    for entry in settings.entries() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(out, "# {}", entry.description)?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(out, "{} = {}\n", entry.key, entry.value)?;
        out.reset()?;
    }
    Ok(())
}

/// Checks shared by `install` and `update`, run before anything is written.
async fn preflight() -> Result<InitSystem> {
    prerequisites::require_root()?;
    pyenv::check_python_version()
        .await
        .context("Python version check failed")?;
    let init = InitSystem::detect()?;
    prerequisites::require_internet()
        .await
        .context("Error connecting to github.com")?;
    Ok(init)
}

/// Install the bridge and python dependencies into the layout.
async fn provision_environment(
    settings: &Settings,
    layout: &InstallLayout,
    account: &ServiceAccount,
) -> Result<()> {
    layout.venv.ensure().await?;
    layout
        .venv
        .install_requirements(&layout.bridge.requirements())
        .await
        .context("Failed to install python requirements")?;
    if settings.app_gunicorn {
        layout.venv.install_package("gunicorn").await?;
    }
    give_to(layout.venv.path(), account)?;

    install_iotc_library(layout.bridge.path(), Arch::detect()?, &layout.iotc_library)
        .context("Failed to install IOTC library")?;
    Ok(())
}

/// Whether the selected front-end is missing from the environment.
fn front_end_missing(settings: &Settings, venv: &VirtualEnv) -> bool {
    let front_end = FrontEnd::from_gunicorn_flag(settings.app_gunicorn);
    front_end == FrontEnd::Gunicorn && !venv.bin(front_end.program()).exists()
}

/// Install gunicorn when it was switched on after the environment was built.
async fn ensure_front_end(
    settings: &Settings,
    layout: &InstallLayout,
    account: &ServiceAccount,
) -> Result<()> {
    if front_end_missing(settings, &layout.venv) {
        layout.venv.ensure().await?;
        layout.venv.install_package("gunicorn").await?;
        give_to(layout.venv.path(), account)?;
    }
    Ok(())
}

/// Install the relay and point the bridge at it. Returns whether anything changed.
async fn provision_relay(
    client: &reqwest::Client,
    settings: &Settings,
    layout: &InstallLayout,
) -> Result<bool> {
    let relay = layout
        .relay
        .ensure(client, &settings.media_mtx_version)
        .await
        .context("Failed to install MediaMTX")?;
    env_file::update_key(&layout.bridge.env_file(), "MTX_TAG", &relay.version)?;
    let patched = layout.bridge.patch_mediamtx_path(&layout.relay.binary())?;
    Ok(relay.changed || patched)
}

pub async fn run_install(settings: &Settings, init: InitSystem) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    say(&mut stdout, Color::Cyan, true, "🔧 docker-wyze-bridge installation");
    let _ = writeln!(stdout, "Service manager: {init:?}");
    let _ = writeln!(stdout, "Listening on: {}\n", settings.bind_address());

    let client = download::http_client()?;
    let release = download::resolve(&client, Component::Bridge, &settings.app_version)
        .await
        .context("Failed to look up docker-wyze-bridge release")?;

    let account = ensure_service_account(&settings.app_user)
        .await
        .context("Failed to create service account")?;
    let layout = InstallLayout::new(settings, &account);

    let installed = layout.bridge.installed_version()?;
    let skip_app = installed.as_deref() == Some(release.version.as_str());
    match &installed {
        Some(v) if skip_app => say(
            &mut stdout,
            Color::Magenta,
            false,
            &format!("docker-wyze-bridge {v} already installed at {}", settings.app_path.display()),
        ),
        Some(v) => say(
            &mut stdout,
            Color::Yellow,
            false,
            &format!(
                "docker-wyze-bridge {v} found at {}. Installing {} over it.",
                settings.app_path.display(),
                release.version
            ),
        ),
        None => {}
    }

    create_application_folders(&layout.owned_folders(), &account)?;
    if !skip_app {
        layout
            .bridge
            .install(&client, &release)
            .await
            .context("Failed to install docker-wyze-bridge")?;
    }

    say(&mut stdout, Color::Cyan, false, "📦 Provisioning python environment...");
    provision_environment(settings, &layout, &account).await?;
    write_app_env_template(&layout.app_conf, &account)?;

    say(&mut stdout, Color::Cyan, false, "📥 Installing MediaMTX and ffmpeg...");
    provision_relay(&client, settings, &layout).await?;
    ffmpeg::ensure_ffmpeg(&client, Path::new("/"))
        .await
        .context("Failed to install ffmpeg")?;

    say(&mut stdout, Color::Cyan, false, "⚙ Installing service...");
    let unit = UnitSpec::new(settings, &layout.venv);
    init.install(&unit)
        .await
        .context("Failed to install wyze-bridge service")?;

    give_to(layout.bridge.path(), &account)?;
    give_to(layout.relay.dir(), &account)?;
    init.restart().await.context("Failed to start wyze-bridge service")?;

    settings.save().context("Failed to save installer settings")?;

    say(&mut stdout, Color::Green, true, "\n✅ Installation completed.");
    say(
        &mut stdout,
        Color::Cyan,
        false,
        &format!(
            "{} for wbadmin password, otherwise update configuration file to configure service.",
            init.log_hint()
        ),
    );
    print_config_warning(&mut stdout, settings);
    Ok(())
}

pub async fn run_update(settings: &Settings, init: InitSystem) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    say(&mut stdout, Color::Cyan, true, "🔍 Checking for docker-wyze-bridge updates...");

    let client = download::http_client()?;
    let release = download::resolve(&client, Component::Bridge, &settings.app_version)
        .await
        .context("Failed to look up docker-wyze-bridge release")?;

    let account = ensure_service_account(&settings.app_user)
        .await
        .context("Failed to create service account")?;
    let layout = InstallLayout::new(settings, &account);
    let installed = layout.bridge.installed_version()?;

    let mut changed = false;
    if installed.as_deref() != Some(release.version.as_str()) {
        let old = installed.as_deref().unwrap_or("unknown");
        say(
            &mut stdout,
            Color::Green,
            false,
            &format!("Updating docker-wyze-bridge from {old} to {}.", release.version),
        );

        for source in [layout.bridge.path(), layout.tokens.as_path()] {
            if let Some(archive) = backup::create_backup(source, &layout.backups, old)? {
                info!("Backup written to {}", archive.display());
            }
        }
        if layout.backups.is_dir() {
            give_to(&layout.backups, &account)?;
        }

        say(
            &mut stdout,
            Color::Magenta,
            false,
            &format!("Deleting old version of docker-wyze-bridge at: {}", settings.app_path.display()),
        );
        layout.bridge.remove()?;
        create_application_folders(&layout.owned_folders(), &account)?;
        layout
            .bridge
            .install(&client, &release)
            .await
            .context("Failed to install docker-wyze-bridge")?;
        provision_environment(settings, &layout, &account).await?;
        changed = true;
    } else {
        say(&mut stdout, Color::Green, false, "docker-wyze-bridge is already up-to-date.");
    }

    changed |= provision_relay(&client, settings, &layout).await?;

    ensure_front_end(settings, &layout, &account).await?;
    let unit = UnitSpec::new(settings, &layout.venv);
    changed |= init
        .install(&unit)
        .await
        .context("Failed to install wyze-bridge service")?;

    give_to(layout.bridge.path(), &account)?;
    give_to(layout.relay.dir(), &account)?;

    if changed {
        say(&mut stdout, Color::Magenta, false, "Restarting wyze-bridge service.");
        init.restart().await.context("Failed to restart wyze-bridge service")?;
    } else {
        say(&mut stdout, Color::Green, false, "Nothing to update.");
    }

    settings.save().context("Failed to save installer settings")?;
    print_config_warning(&mut stdout, settings);
    Ok(())
}

fn print_config_warning(out: &mut impl WriteColor, settings: &Settings) {
    say(
        out,
        Color::Magenta,
        true,
        "⚠ Any changes made to the .env file in the application folder will be lost when the application is updated!",
    );
    say(
        out,
        Color::Green,
        false,
        &format!("Store any required configuration in {}", settings.app_conf.display()),
    );
}
