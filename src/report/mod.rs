pub mod table;
pub mod json;

use crate::config::Config;
use crate::scan::TrackSummary;
use crate::util::format_bytes;

pub fn print_scan(summary: &TrackSummary, config: &Config) {
    if config.json_output {
        println!("{}", json::render(summary));
        return;
    }

    let report = &summary.report;
    print!("{}", table::render(&report.files, report.now_ms));
    println!(
        "\n{} newly tracked, {} pending in total",
        summary.newly_tracked, summary.pending
    );
    print_scan_info(summary, config.verbose);
    print_diagnostics(&report.diagnostics, config.verbose);
}

fn print_scan_info(summary: &TrackSummary, verbose: bool) {
    let Some(duration_ms) = summary.report.duration_ms else { return };

    let duration_sec = duration_ms as f64 / 1000.0;
    println!("scan completed in {duration_sec:.2}s");

    if verbose {
        if let Some(peak_bytes) = summary.report.peak_memory_bytes {
            println!("peak memory: {}", format_bytes(peak_bytes as u64));
        }
    }
}

fn print_diagnostics(diagnostics: &[String], verbose: bool) {
    if diagnostics.is_empty() {
        return;
    }

    println!();
    if verbose {
        println!("Diagnostics:");
        println!("{}", "-".repeat(40));
        for diagnostic in diagnostics {
            println!("  {diagnostic}");
        }
    } else {
        println!("[diagnostic] {} entries skipped, rerun with -v for details", diagnostics.len());
    }
}
