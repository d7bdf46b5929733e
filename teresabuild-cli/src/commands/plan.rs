//! `teresabuild plan` - print the command lines a run would execute

use anyhow::{Context, Result};
use teresabuild_core::plan;

use super::StepArgs;

pub fn run_plan(args: StepArgs) -> Result<()> {
    let resolved = args.resolve()?;
    resolved
        .config
        .validate()
        .context("Cannot plan an invalid configuration")?;

    for invocation in plan(&resolved.cli, &resolved.config) {
        let mut notes = Vec::new();
        if invocation.stdin.is_some() {
            notes.push("password via stdin");
        }
        if !invocation.step.is_fatal() {
            notes.push("non-fatal");
        }

        if notes.is_empty() {
            println!("{:<12} {}", invocation.step, invocation.command_line);
        } else {
            println!(
                "{:<12} {}    ({})",
                invocation.step,
                invocation.command_line,
                notes.join(", ")
            );
        }
    }

    Ok(())
}
