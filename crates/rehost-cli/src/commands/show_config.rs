use std::path::Path;
use std::process::ExitCode;

use super::Overrides;

pub fn show_config(config: Option<&Path>, overrides: &Overrides) -> anyhow::Result<ExitCode> {
    let settings = super::resolve_settings(config, overrides)?;

    print!("{}", settings.to_toml_string().map_err(anyhow::Error::msg)?);
    println!();
    match super::api_endpoint(&settings) {
        Ok(endpoint) => println!("# manager API: {}", endpoint.url("/api/v1/")),
        Err(e) => println!("# manager API: unresolved ({e})"),
    }
    Ok(ExitCode::SUCCESS)
}
