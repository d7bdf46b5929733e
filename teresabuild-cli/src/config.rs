use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use teresabuild_core::Settings;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a starter settings file
    Init(InitArgs),
    /// Print the resolved settings (password masked)
    Show(ShowArgs),
    /// Show settings file path
    Path,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the file (default: ~/.teresabuild/config.toml)
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Force overwrite existing settings
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Settings file to show instead of the default
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Show(args) => run_show(args),
        ConfigCommands::Path => run_path(),
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path = args.path.unwrap_or_else(Settings::default_path);

    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Settings already exist at {:?}\n\nUse --force to overwrite",
            config_path
        ));
    }

    Settings::write_template(&config_path)?;

    println!("✅ Created settings at: {:?}", config_path);
    println!("\nNext steps:");
    println!("  1. Edit the settings: $EDITOR {:?}", config_path);
    println!("  2. Export TERESA_PASSWORD in the build environment");
    println!("  3. Run: teresabuild validate");

    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    let settings = Settings::load_or_default(args.config.as_deref())?;

    let toml_str = settings
        .masked()
        .to_toml()
        .context("Failed to serialize settings to TOML")?;

    println!("{}", toml_str);

    Ok(())
}

fn run_path() -> Result<()> {
    println!("{}", Settings::default_path().display());
    Ok(())
}
