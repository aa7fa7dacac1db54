//! Build phases for the static report site.
//!
//! Mirrors the site layout: one page per suite, a coverage summary page
//! linking the full HTML tree, an index, and a machine-readable
//! `summary.json`. Suite pages are written even when the suite fails, so
//! the output that explains the failure is never lost; the failure then
//! aborts the build.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::exec::{CommandRunner, Invocation};
use crate::process::Captured;
use crate::render::{Page, PageLink, render_page};

const UNIT_PAGE: &str = "unit/index.html";
const PROPERTY_PAGE: &str = "property/index.html";
const COVERAGE_PAGE: &str = "coverage/index.html";
const COVERAGE_HTML_DIR: &str = "coverage/htmlcov";
const SUMMARY_FILE: &str = "summary.json";

/// Layout of the generated site under the output directory.
#[derive(Debug, Clone)]
pub struct SitePaths {
    pub root: PathBuf,
    pub unit_page: PathBuf,
    pub property_page: PathBuf,
    pub coverage_page: PathBuf,
    pub coverage_html_dir: PathBuf,
    pub index_page: PathBuf,
    pub summary_path: PathBuf,
}

impl SitePaths {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            root: output_dir.to_path_buf(),
            unit_page: output_dir.join(UNIT_PAGE),
            property_page: output_dir.join(PROPERTY_PAGE),
            coverage_page: output_dir.join(COVERAGE_PAGE),
            coverage_html_dir: output_dir.join(COVERAGE_HTML_DIR),
            index_page: output_dir.join("index.html"),
            summary_path: output_dir.join(SUMMARY_FILE),
        }
    }
}

/// Record of one executed phase, persisted to `summary.json`.
#[derive(Debug, Serialize)]
pub struct PhaseRecord {
    pub phase: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_secs: f64,
    pub page: Option<String>,
}

/// Everything `summary.json` records about a successful build.
#[derive(Debug, Serialize)]
pub struct SiteSummary {
    pub generated_at: String,
    pub phases: Vec<PhaseRecord>,
}

/// Run every suite and render the whole site.
///
/// The output directory is recreated from scratch. Phases run in order
/// (unit, property, coverage, index) and the first hard failure aborts the
/// build; `summary.json` is written only when everything passed.
#[instrument(skip_all, fields(output = %paths.root.display()))]
pub fn build_site<R: CommandRunner>(
    runner: &R,
    repo_root: &Path,
    paths: &SitePaths,
) -> Result<SiteSummary> {
    reset_site_dir(&paths.root)?;

    let mut phases = Vec::new();
    suite_page(
        runner,
        "unit",
        "Unit test results",
        unit_invocation(),
        &paths.unit_page,
        UNIT_PAGE,
        &mut phases,
    )?;
    suite_page(
        runner,
        "property",
        "Property test results",
        property_invocation(),
        &paths.property_page,
        PROPERTY_PAGE,
        &mut phases,
    )?;
    let total = coverage_pages(runner, repo_root, paths, &mut phases)?;
    write_index(paths, total.as_deref())?;

    let summary = SiteSummary {
        generated_at: Utc::now().to_rfc3339(),
        phases,
    };
    write_summary(&paths.summary_path, &summary)?;
    info!(index = %paths.index_page.display(), "site built");
    Ok(summary)
}

/// Everything that is not a property suite: unit tests in lib and bin
/// targets across the workspace.
fn unit_invocation() -> Invocation {
    Invocation::new("cargo", &["test", "--workspace", "--lib", "--bins"])
}

fn property_invocation() -> Invocation {
    Invocation::new("cargo", &["test", "-p", "tether", "--test", "properties"])
}

fn coverage_clean_invocation() -> Invocation {
    Invocation::new("cargo", &["llvm-cov", "clean", "--workspace"])
}

fn coverage_run_invocation() -> Invocation {
    Invocation::new("cargo", &["llvm-cov", "--workspace", "--no-report"])
}

fn coverage_report_invocation() -> Invocation {
    Invocation::new("cargo", &["llvm-cov", "report"])
}

fn coverage_html_invocation() -> Invocation {
    Invocation::new("cargo", &["llvm-cov", "report", "--html"])
}

/// Run one invocation and record it for `summary.json`.
fn run_phase<R: CommandRunner>(
    runner: &R,
    phase: &str,
    invocation: Invocation,
    page: Option<&str>,
    phases: &mut Vec<PhaseRecord>,
) -> Result<Captured> {
    info!(phase, command = %invocation, "running");
    let started = Instant::now();
    let captured = runner.run(&invocation)?;
    phases.push(PhaseRecord {
        phase: phase.to_string(),
        command: invocation.to_string(),
        exit_code: captured.exit_code,
        timed_out: captured.timed_out,
        duration_secs: started.elapsed().as_secs_f64(),
        page: page.map(str::to_string),
    });
    Ok(captured)
}

/// Run a test suite and write its page. The page is written before a
/// failing suite aborts the build.
fn suite_page<R: CommandRunner>(
    runner: &R,
    phase: &str,
    title: &str,
    invocation: Invocation,
    page_path: &Path,
    page_rel: &str,
    phases: &mut Vec<PhaseRecord>,
) -> Result<()> {
    let captured = run_phase(runner, phase, invocation, Some(page_rel), phases)?;
    let output = captured.combined();
    write_page(
        page_path,
        &Page {
            title,
            body: body_or_placeholder(&output),
            subtitle: None,
            links: &[],
            preformatted: true,
        },
    )?;
    if !captured.success {
        bail!(
            "{phase} tests failed (exit code {:?}); output kept at {}",
            captured.exit_code,
            page_path.display()
        );
    }
    Ok(())
}

/// The coverage pipeline: clean, run, text report, HTML report, then the
/// summary page and a copy of the HTML tree. Returns the report's TOTAL row
/// for the index banner.
fn coverage_pages<R: CommandRunner>(
    runner: &R,
    repo_root: &Path,
    paths: &SitePaths,
    phases: &mut Vec<PhaseRecord>,
) -> Result<Option<String>> {
    let clean = run_phase(
        runner,
        "coverage-clean",
        coverage_clean_invocation(),
        None,
        phases,
    )?;
    if !clean.success {
        if mentions_no_data(&clean.combined()) {
            warn!("coverage clean had no data to remove, continuing");
        } else {
            bail!("coverage clean failed (exit code {:?})", clean.exit_code);
        }
    }

    let run = run_phase(
        runner,
        "coverage-run",
        coverage_run_invocation(),
        None,
        phases,
    )?;
    if !run.success {
        bail!("coverage run failed (exit code {:?})", run.exit_code);
    }

    let report = run_phase(
        runner,
        "coverage-report",
        coverage_report_invocation(),
        Some(COVERAGE_PAGE),
        phases,
    )?;
    if !report.success {
        bail!("coverage report failed (exit code {:?})", report.exit_code);
    }

    let html = run_phase(
        runner,
        "coverage-html",
        coverage_html_invocation(),
        None,
        phases,
    )?;
    if !html.success {
        bail!("coverage html failed (exit code {:?})", html.exit_code);
    }

    let summary = report.stdout.trim();
    write_page(
        &paths.coverage_page,
        &Page {
            title: "Coverage summary",
            body: body_or_placeholder(summary),
            subtitle: None,
            links: &[PageLink::new(
                "Open HTML coverage report",
                "htmlcov/index.html",
            )],
            preformatted: true,
        },
    )?;

    let generated = repo_root.join("target/llvm-cov/html");
    copy_tree(&generated, &paths.coverage_html_dir)
        .with_context(|| format!("copy coverage html from {}", generated.display()))?;

    Ok(total_line(summary))
}

fn write_index(paths: &SitePaths, total: Option<&str>) -> Result<()> {
    let links = [
        PageLink::new("Unit test results", UNIT_PAGE),
        PageLink::new("Property test results", PROPERTY_PAGE),
        PageLink::new("Coverage summary", COVERAGE_PAGE),
        PageLink::new("Coverage HTML", "coverage/htmlcov/index.html"),
    ];
    let banner = total.map(|t| format!("Latest coverage: {t}"));
    write_page(
        &paths.index_page,
        &Page {
            title: "Tether test reports",
            body: "Select a report from the links below.",
            subtitle: banner.as_deref(),
            links: &links,
            preformatted: false,
        },
    )
}

fn body_or_placeholder(output: &str) -> &str {
    if output.is_empty() { "(no output)" } else { output }
}

/// The clean step is allowed to fail only when it had nothing to remove.
fn mentions_no_data(output: &str) -> bool {
    static NO_DATA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)no data to (erase|clean|remove)").unwrap());
    NO_DATA_RE.is_match(output)
}

/// Pull the TOTAL row out of the text report table, collapsed to one line.
fn total_line(summary: &str) -> Option<String> {
    static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^TOTAL\b.*$").unwrap());
    TOTAL_RE
        .find(summary)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

fn write_page(path: &Path, page: &Page<'_>) -> Result<()> {
    let html = render_page(page)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, html).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), "wrote page");
    Ok(())
}

fn write_summary(path: &Path, summary: &SiteSummary) -> Result<()> {
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn reset_site_dir(root: &Path) -> Result<()> {
    if root.exists() {
        fs::remove_dir_all(root).with_context(|| format!("remove {}", root.display()))?;
    }
    fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))?;
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        bail!("missing {}", src.display());
    }
    for entry in WalkDir::new(src) {
        let entry = entry.context("walk coverage html")?;
        let rel = entry.path().strip_prefix(src).context("strip prefix")?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}
