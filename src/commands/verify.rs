use std::path::Path;

use anyhow::{Result, bail};
use owo_colors::OwoColorize;
use schoolcal_core::baseline::{Baseline, BaselineFile};
use schoolcal_core::lock::RunLock;
use schoolcal_core::pipeline::{Pipeline, run_time};
use schoolcal_core::publish::Publisher;

use super::create_spinner;
use crate::render::Render;

/// Returns the process exit code: 0 healthy, 1 published copy wrong,
/// 2 local copy wrong.
pub async fn run(
    config: Option<&Path>,
    fix: bool,
    expect_total: Option<usize>,
    expect_month: &[(u32, usize)],
) -> Result<u8> {
    let (settings, roster) = super::load(config)?;

    let baseline = match BaselineFile::load(&settings.baseline_path())? {
        Some(file) => file.baseline(),
        None if expect_total.is_some() => Baseline::default(),
        None => bail!(
            "No baseline pinned at {}.\n\n\
            Pin one from a snapshot you trust with:\n  \
            schoolcal baseline pin\n\n\
            or pass the expected counts:\n  \
            schoolcal verify --expect-total 22 --expect-month 10=9",
            settings.baseline_path().display()
        ),
    };
    let baseline = baseline.with_overrides(expect_total, expect_month);

    let _lock: Option<RunLock> = if fix { Some(super::lock(&settings)?) } else { None };
    let Some(publisher) = super::publisher(&settings, false)? else {
        bail!("Publishing is disabled in config; there is no published copy to verify");
    };
    let pipeline = Pipeline::new(&settings, roster, Some(&publisher as &dyn Publisher));

    let spinner = create_spinner("Checking local and published snapshots".to_string());
    let result = pipeline.verify(&baseline, fix, run_time(&settings, None)?).await;
    spinner.finish_and_clear();
    let outcome = result?;

    println!("{}", outcome.report.render());

    if let Some(repaired) = &outcome.repaired {
        println!("\n{}", "After republishing:".bold());
        println!("{}", repaired.render());
    }
    if let Some(e) = &outcome.repair_error {
        println!("\n{} {}", "Repair failed:".red(), e);
    }
    if !fix && outcome.report.verdict.is_repairable() {
        println!("\nRun {} to republish from local data", "schoolcal verify --fix".bold());
    }

    let code = u8::try_from(outcome.exit_code()).unwrap_or(1);
    let final_report = outcome.repaired.unwrap_or(outcome.report);
    match final_report.into_result() {
        Ok(_) => println!("\n{}", "Snapshots match the baseline".green()),
        Err(e) => println!("\n{}", e.red()),
    }
    Ok(code)
}
