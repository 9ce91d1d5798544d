//! Initialize a critflux project.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};

pub fn run(path: Option<String>, force: bool) -> Result<()> {
    let base_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    println!("{} Initializing critflux project...", "→".blue());

    std::fs::create_dir_all(&base_path)
        .with_context(|| format!("Failed to create {}", base_path.display()))?;

    let config_path = base_path.join(CONFIG_FILE);
    if config_path.exists() && !force {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
    } else {
        Config::default().save(&config_path)?;
        println!("  {} Created {}", "✓".green(), config_path.display());
    }

    println!();
    println!("{} critflux project initialized!", "✓".green().bold());
    println!();
    println!("Next steps:");
    println!("  {} critflux mesh", "1.".blue());
    println!("  {} critflux run --steps 1000", "2.".blue());
    println!("  {} critflux avalanche --plot", "3.".blue());

    Ok(())
}
