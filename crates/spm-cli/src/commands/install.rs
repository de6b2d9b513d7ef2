use miette::{IntoDiagnostic, Result};
use spm_core::pkg::{run_install, InstallOptions, InstallOutcome, InstallReport, InstalledPackage};
use spm_core::Config;
use tracing::debug;

/// Flags of `spm install` that are not configuration.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub identifiers: Vec<String>,
    pub force: bool,
    pub save: bool,
    pub save_dev: bool,
}

/// Run `spm install`.
///
/// Exits with code 1 if any package failed and code 2 if the run could not
/// start at all (bad registry URL, unreadable manifest).
pub fn run(config: &Config, args: InstallArgs, json: bool) -> Result<()> {
    let options = InstallOptions::from_config(config)
        .with_force(args.force)
        .with_save(args.save)
        .with_save_dev(args.save_dev);

    debug!(
        cwd = %options.base_dir.display(),
        destination = %options.destination_dir.display(),
        cache = %options.cache_dir.display(),
        registry = %options.registry,
        "Starting install"
    );

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = runtime.block_on(run_install(options, args.identifiers));

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if json {
                let output = serde_json::json!({
                    "ok": false,
                    "error": { "code": e.code(), "message": e.message() }
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            } else {
                eprintln!("error: {e}");
            }
            std::process::exit(2);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        print_report(&report);
    }

    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &InstallReport) {
    for pkg in &report.packages {
        println!("{}", describe(pkg));
    }

    for note in &report.notes {
        println!("{note}");
    }

    for failure in &report.failures {
        eprintln!(
            "error: {} ({}): {}",
            failure.identifier, failure.code, failure.message
        );
    }

    let summary = &report.summary;
    println!(
        "\n{} installed ({} downloaded, {} from cache), {} skipped, {} failed",
        summary.downloaded + summary.cached,
        summary.downloaded,
        summary.cached,
        summary.skipped,
        summary.failed
    );
}

fn describe(pkg: &InstalledPackage) -> String {
    let label = match &pkg.version {
        Some(version) => format!("{}@{version}", pkg.name),
        None => pkg.name.clone(),
    };

    match pkg.outcome {
        InstallOutcome::Downloaded => format!("+ {label}"),
        InstallOutcome::ServedFromCache => format!("+ {label} (cached)"),
        InstallOutcome::SkippedExisting => format!("= {label} (already installed)"),
        InstallOutcome::SkippedDuplicate => format!("= {label} (duplicate)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(version: Option<&str>, outcome: InstallOutcome) -> InstalledPackage {
        InstalledPackage {
            name: "foo".into(),
            version: version.map(Into::into),
            outcome,
            root: true,
            path: None,
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&pkg(Some("1.2.0"), InstallOutcome::Downloaded)),
            "+ foo@1.2.0"
        );
        assert_eq!(
            describe(&pkg(Some("1.2.0"), InstallOutcome::ServedFromCache)),
            "+ foo@1.2.0 (cached)"
        );
        assert_eq!(
            describe(&pkg(None, InstallOutcome::SkippedDuplicate)),
            "= foo (duplicate)"
        );
    }
}
