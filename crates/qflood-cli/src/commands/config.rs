//! Config command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use super::common::{default_config_path, load_config};

/// Print the configuration a solve would run with.
pub fn execute(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    let source = path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    println!("{} {}", style("# Source:").dim(), style(source).dim());
    print!("{}", serde_yaml_ng::to_string(&config)?);
    Ok(())
}
