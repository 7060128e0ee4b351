//! Grid command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use qflood_linalg::{ArrayArtifact, FloodParameters, LinearSystem};

/// Assemble the grid system and write `matrix_a.json` and `vector_b.json`.
pub fn execute(grid_resolution: usize, source_value: f64, output: &Path) -> Result<()> {
    let params = FloodParameters {
        grid_resolution,
        source_value,
        ..FloodParameters::default()
    };
    let system = LinearSystem::from_grid(&params)?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let files = [
        ("matrix_a.json", ArrayArtifact::from_csr(system.a())),
        ("vector_b.json", ArrayArtifact::from_vector(system.b())),
    ];
    for (name, artifact) in files {
        let path = output.join(name);
        std::fs::write(&path, artifact.to_bytes()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    println!(
        "{} Wrote {}x{} grid ({} unknowns, {} non-zeros) to {}",
        style("✓").green().bold(),
        grid_resolution,
        grid_resolution,
        system.dim(),
        system.a().nnz(),
        style(output.display()).cyan()
    );
    Ok(())
}
