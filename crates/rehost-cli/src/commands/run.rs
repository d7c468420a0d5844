use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;

use rehost_core::RenameMapping;
use rehost_engine::{
    EngineConfig, Pairing, ReconcilePhase, Reconciler, RunReport, default_host_table_wait,
};

use super::Overrides;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub mapping: Option<PathBuf>,
    pub wait_for_hosts: bool,
    pub auto_confirm: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            mapping: None,
            wait_for_hosts: false,
            auto_confirm: true,
        }
    }
}

pub async fn run(
    config: Option<&Path>,
    overrides: &Overrides,
    options: RunOptions,
) -> anyhow::Result<ExitCode> {
    let settings = super::resolve_settings(config, overrides)?;

    let pairing = match &options.mapping {
        Some(path) => {
            let mapping = RenameMapping::read_artifact(path)?;
            info!(path = %path.display(), entries = mapping.len(), "using operator-supplied mapping");
            Pairing::Explicit(mapping)
        }
        None => Pairing::Positional,
    };

    let engine_config = EngineConfig {
        artifact_path: settings.artifact_path.clone(),
        auto_confirm: options.auto_confirm,
        dry_run: options.dry_run,
        pairing,
        await_local_host: options.wait_for_hosts.then(default_host_table_wait),
        ..EngineConfig::default()
    };

    let client = super::api_client(&settings)?;
    info!(api = %client.endpoint().url("/api/v1/"), "using manager API");

    let report = Reconciler::new(
        super::controller(&settings),
        client,
        super::host_table(&settings),
        engine_config,
    )
    .run()
    .await;

    print_report(&report, &settings.artifact_path);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &RunReport, artifact: &Path) {
    if let Some(mapping) = &report.mapping {
        println!("Mapping for cluster {} ({}):", mapping.cluster_name(), artifact.display());
        for record in mapping.entries() {
            let marker = if record.is_rename() { "→" } else { "=" };
            println!("  {} {marker} {}", record.old_name, record.new_name);
        }
    }

    match report.phase {
        ReconcilePhase::NoChangeNeeded => println!("✓ No hostname change is needed"),
        ReconcilePhase::MappingComputed => println!("✓ Mapping written, no services touched"),
        ReconcilePhase::Done => println!("✓ Hostnames updated"),
        _ => {}
    }

    if report.took_action() {
        println!("  control node stop:    {}", report.server_stop);
        println!("  rename:               {}", report.rename);
        println!("  control node restart: {}", report.server_restart);
        for member in &report.members {
            println!(
                "  {}: stop {}, reset {}, start {}",
                member.host, member.stop, member.reset, member.start
            );
        }
    }

    let failed = report.failed_members();
    if !failed.is_empty() {
        eprintln!("{} member(s) need a manual agent restart:", failed.len());
        for member in failed {
            eprintln!("  {}", member.host);
        }
    }

    if let Some(e) = &report.failure {
        eprintln!("✗ Failed during {}: {e}", last_active_phase(report));
        if e.is_pre_destructive() {
            eprintln!("  No service was stopped; the cluster is unchanged.");
        }
    }
}

/// Phase the run was in before it failed.
fn last_active_phase(report: &RunReport) -> ReconcilePhase {
    report
        .history
        .iter()
        .rev()
        .copied()
        .find(|p| *p != ReconcilePhase::Failed)
        .unwrap_or(ReconcilePhase::Idle)
}
