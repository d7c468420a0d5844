pub mod run;
pub mod show_config;
pub mod status;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;

use rehost_api::{ApiEndpoint, Credentials, ManagerClient, TlsConfig};
use rehost_core::{HostsFile, Settings, read_server_properties};
use rehost_exec::{ControllerConfig, ProcessController, SystemRunner};

/// Command-line overrides applied on top of the settings file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Host the manager API is reached on.
    #[arg(long)]
    pub server_host: Option<String>,
    /// Control-node properties file.
    #[arg(long)]
    pub properties: Option<PathBuf>,
    /// Host table to discover current hostnames from.
    #[arg(long)]
    pub hosts_file: Option<PathBuf>,
    /// Where to write the mapping artifact.
    #[arg(long)]
    pub artifact: Option<PathBuf>,
    /// SSH user for member agents.
    #[arg(long)]
    pub ssh_user: Option<String>,
    /// Accept self-signed control-node certificates.
    #[arg(long)]
    pub tls_insecure: bool,
}

/// Load settings from `path` (or defaults) and apply `overrides`.
pub fn resolve_settings(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(path)?;

    if let Some(host) = &overrides.server_host {
        settings.server_host = host.clone();
    }
    if let Some(path) = &overrides.properties {
        settings.properties_path = path.clone();
    }
    if let Some(path) = &overrides.hosts_file {
        settings.hosts_path = path.clone();
    }
    if let Some(path) = &overrides.artifact {
        settings.artifact_path = path.clone();
    }
    if let Some(user) = &overrides.ssh_user {
        settings.ssh.user = Some(user.clone());
    }
    if overrides.tls_insecure {
        settings.tls.insecure = true;
    }

    Ok(settings)
}

pub fn controller(settings: &Settings) -> ProcessController<SystemRunner> {
    let mut runner = SystemRunner::new();
    if settings.commands.timeout_secs > 0 {
        runner = runner.with_timeout(Duration::from_secs(settings.commands.timeout_secs));
    }
    ProcessController::new(
        runner,
        ControllerConfig::from_settings(&settings.commands, &settings.ssh),
    )
}

pub fn host_table(settings: &Settings) -> HostsFile {
    HostsFile::new(&settings.hosts_path).with_ignore_markers(settings.ignore_markers.clone())
}

pub fn api_endpoint(settings: &Settings) -> anyhow::Result<ApiEndpoint> {
    let props = read_server_properties(&settings.properties_path)?;
    Ok(ApiEndpoint::from_properties(settings.server_host.clone(), &props))
}

pub fn api_client(settings: &Settings) -> anyhow::Result<ManagerClient> {
    let endpoint = api_endpoint(settings)?;
    let credentials = Credentials::new(
        settings.credentials.username.clone(),
        settings.credentials.password.clone(),
    );
    let tls = TlsConfig::from_settings(settings.tls.insecure)?;
    Ok(ManagerClient::new(endpoint, credentials, settings.requested_by.clone())
        .with_tls(tls)
        .with_timeout(Duration::from_secs(settings.api_timeout_secs)))
}
