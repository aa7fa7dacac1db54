//! Subcommand entry points.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::load_config;
use crate::exec::ShellRunner;
use crate::report::{SitePaths, build_site};

const CONFIG_FILE: &str = "reports.toml";

/// Build the full report site under the configured output directory.
pub fn build(repo_root: &Path) -> Result<()> {
    let config = load_config(&repo_root.join(CONFIG_FILE)).context("load config")?;
    debug!(?config, "configuration loaded");

    let runner = ShellRunner::new(repo_root, &config);
    let paths = SitePaths::new(&repo_root.join(&config.output_dir));
    let summary = build_site(&runner, repo_root, &paths)?;

    for phase in &summary.phases {
        let exit = match phase.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        };
        println!(
            "[reports] {}: exit={} ({:.1}s)",
            phase.phase, exit, phase.duration_secs
        );
    }
    println!("[reports] site at {}", paths.index_page.display());
    Ok(())
}

/// Remove a previously generated site, if any.
pub fn clean(repo_root: &Path) -> Result<()> {
    let config = load_config(&repo_root.join(CONFIG_FILE)).context("load config")?;
    let site = repo_root.join(&config.output_dir);
    if site.exists() {
        fs::remove_dir_all(&site).with_context(|| format!("remove {}", site.display()))?;
        println!("[reports] removed {}", site.display());
    } else {
        println!("[reports] nothing to remove at {}", site.display());
    }
    Ok(())
}
