//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - hybrid quantum/classical flood solver",
        style("qflood").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qflood-linalg  Sparse systems, preparation and classical solvers");
    println!("  qflood-sim     Statevector HHL circuit solver");
    println!("  qflood-sched   Job lifecycle and hybrid fallback orchestration");
    println!("  qflood-cli     Command-line interface");
    println!();
    println!(
        "Repository: {}",
        style(env!("CARGO_PKG_REPOSITORY")).underlined()
    );
    println!("License:    {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
