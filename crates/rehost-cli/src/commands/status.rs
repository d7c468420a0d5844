use std::path::Path;
use std::process::ExitCode;

use futures_util::future::join_all;

use rehost_core::HostSource;
use rehost_exec::{ServiceControl, ServiceTarget};

use super::Overrides;

pub async fn status(config: Option<&Path>, overrides: &Overrides) -> anyhow::Result<ExitCode> {
    let settings = super::resolve_settings(config, overrides)?;
    let control = super::controller(&settings);
    let hosts = super::host_table(&settings).current_hostnames()?;

    let server = control.status(&ServiceTarget::ControlNode).await;
    println!("control node   {server}");

    let agents = join_all(hosts.iter().map(|host| {
        let control = &control;
        async move {
            let status = control.status(&ServiceTarget::Agent(host.clone())).await;
            (host, status)
        }
    }))
    .await;

    for (host, status) in agents {
        println!("{host:<14} {status}");
    }
    Ok(ExitCode::SUCCESS)
}
