use anyhow::{Context, Result};
use clap::Parser;
use known_defects::cli::{Cli, OutputFormat};
use known_defects::config::{ScanConfig, resolve_roots};
use known_defects::extract::AnnotationKind;
use known_defects::log::{TracingLog, init_logging};
use known_defects::results::ScanResults;
use known_defects::scanner::Scanner;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ScanConfig::from_cli(&cli);
    let roots = resolve_roots(&cli);
    if roots.is_empty() {
        tracing::warn!("no scan roots given and no target/test-classes directory found");
    }

    let start = Instant::now();
    let log = TracingLog;
    let results = Scanner::new(&config, &log)
        .scan_roots(&roots)
        .context("Failed to scan for annotations")?;

    let report = ScanReport::new(&roots, &results, start.elapsed().as_millis() as u64);
    let content = match cli.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Text => render_text(&report),
    };
    write_output(&content, cli.output.as_deref())
}

#[derive(Debug, Serialize)]
struct KindCount {
    kind: AnnotationKind,
    annotation: &'static str,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    roots: Vec<String>,
    duration_ms: u64,
    counts: Vec<KindCount>,
    results: &'a ScanResults,
}

impl<'a> ScanReport<'a> {
    fn new(roots: &[PathBuf], results: &'a ScanResults, duration_ms: u64) -> Self {
        let counts = AnnotationKind::ALL
            .into_iter()
            .map(|kind| KindCount {
                kind,
                annotation: kind.display_name(),
                count: results.count_of_kind(kind),
            })
            .collect();

        Self {
            roots: roots
                .iter()
                .map(|r| r.to_string_lossy().to_string())
                .collect(),
            duration_ms,
            counts,
            results,
        }
    }
}

fn render_text(report: &ScanReport<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("roots: {}\n", report.roots.join(", ")));
    out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
    for c in &report.counts {
        out.push_str(&format!("{}: {}\n", c.annotation, c.count));
    }

    for package in report.results.packages() {
        for class_name in package.class_names() {
            out.push('\n');
            if package.package_name().is_empty() {
                out.push_str(&format!("{class_name}\n"));
            } else {
                out.push_str(&format!("{}.{class_name}\n", package.package_name()));
            }

            for kind in AnnotationKind::ALL {
                let Some(class) = package.class_results(class_name, kind) else {
                    continue;
                };
                out.push_str(&format!("  {kind}\n"));
                for record in class.annotations() {
                    let members: Vec<String> = kind
                        .member_names()
                        .iter()
                        .map(|m| format!("{m}={}", record.member(m).unwrap_or("-")))
                        .collect();
                    out.push_str(&format!(
                        "    - {} (line {}): {}\n",
                        record.method_name(),
                        record.line_number(),
                        members.join(", ")
                    ));
                }
            }
        }
    }

    out
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use known_defects::extract::AnnotationRecord;

    fn sample() -> ScanResults {
        let mut results = ScanResults::new();
        results
            .add_record(
                AnnotationRecord::new(AnnotationKind::AcceptedDefect, "com.acme.Widget", "doThing", 12)
                    .with_member("author", "cjohnston")
                    .with_member("date", "2024-01-01")
                    .with_member("reason", "legacy"),
            )
            .unwrap();
        results
            .add_record(AnnotationRecord::new(AnnotationKind::Defect, "Bare", "run", 0))
            .unwrap();
        results
    }

    #[test]
    fn render_text_lists_classes_with_member_columns() {
        let results = sample();
        let report = ScanReport::new(&[PathBuf::from("classes")], &results, 5);
        let text = render_text(&report);

        assert!(text.contains("@KnownDefect: 1\n"));
        assert!(text.contains("@KnownAndAcceptedDefect: 1\n"));
        assert!(text.contains("\nBare\n  @KnownDefect\n    - run (line 0): value=-\n"));
        assert!(text.contains(
            "com.acme.Widget\n  @KnownAndAcceptedDefect\n    - doThing (line 12): author=cjohnston, date=2024-01-01, reason=legacy\n"
        ));
    }

    #[test]
    fn report_serializes_counts_and_tree() -> Result<()> {
        let results = sample();
        let report = ScanReport::new(&[PathBuf::from("classes")], &results, 5);
        let value = serde_json::to_value(&report)?;

        assert_eq!(value["counts"][0]["kind"], "defect");
        assert_eq!(value["counts"][1]["count"], 1);
        assert_eq!(
            value["results"]["packages"]["com.acme"]["accepted_defects"]["Widget"]["annotations"][0]
                ["members"]["author"],
            "cjohnston"
        );
        Ok(())
    }
}
