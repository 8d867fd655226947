//! `simulators` command - show which simulator each runtime resolves to

use anyhow::{bail, Result};
use colored::Colorize;

use super::Context;
use crate::ui;

pub async fn execute(ctx: &Context, runtimes: Vec<String>, preferred: Vec<String>) -> Result<()> {
    let test = &ctx.manifest.test;
    let runtimes = if runtimes.is_empty() {
        test.simulator_runtimes.clone()
    } else {
        runtimes
    };
    let preferred = if preferred.is_empty() {
        test.preferred_simulator_names.clone()
    } else {
        preferred
    };
    if runtimes.is_empty() {
        bail!("No simulator runtimes given. Pass --runtime iOS-17-0 or configure test.simulator_runtimes.");
    }

    let simulators = ctx
        .build_tool()
        .resolve_simulators(&runtimes, &preferred)
        .await?;

    ui::print_header("Simulators");
    for simulator in &simulators {
        println!(
            "   {:<12} {:<28} {}",
            simulator.runtime.bright_cyan(),
            simulator.name,
            simulator.udid.dimmed()
        );
    }
    println!();
    Ok(())
}
