use std::io::{self, Write};

use crate::delta::UtilizationPercent;
use crate::monitor::UtilizationReport;

/// Displays a utilization report in the terminal, redrawing the previous one
pub fn display_report(report: &UtilizationReport) -> io::Result<()> {
	let total_lines = report_lines(report.core_busy.len());

	print!("\x1B[{total_lines}A"); // Move cursor up

	print!("\x1B[2K"); // Clear line
	println!(
		"{} | interval {:5.2} s | busy {}",
		report.device_name,
		report.elapsed.as_secs_f64(),
		format_percent(report.aggregate_busy)
	);

	print!("\x1B[2K");
	match &report.device {
		Some(util) => println!("Device Utilization: {}", format_util(&util.device)),
		None => println!("Device Utilization: unavailable"),
	}

	display_core_group(&report.core_busy)?;

	io::stdout().flush()
}

/// Prints a report once, without cursor movement
pub fn print_report(report: &UtilizationReport) {
	println!("{} (cores):", report.device_name);
	if let Some(util) = &report.device {
		println!("   Device Utilization: {}", format_util(&util.device));
		println!("   Per Core Utilization ({} cores in use)", util.cores.len());
		for (i, core) in util.cores.iter().enumerate() {
			let label = format!("Core #{}:", i + 1);
			println!("      {label:<10}{}", format_util(core));
		}
	} else {
		println!("   Device Utilization: unavailable (no ticks elapsed)");
	}
}

/// Helper function to display per-core busy time in a two-column layout
fn display_core_group(core_busy: &[Option<f64>]) -> io::Result<()> {
	for i in (0..core_busy.len()).step_by(2) {
		let core2_str = if i + 1 < core_busy.len() {
			format!("| Core {:3}: {}", i + 1, format_percent(core_busy[i + 1]))
		} else {
			String::new()
		};

		print!("\x1B[2K");
		println!("Core {:3}: {} {}", i, format_percent(core_busy[i]), core2_str);
	}

	Ok(())
}

fn format_util(util: &UtilizationPercent) -> String {
	format!("User: {:6.2}%, System: {:6.2}%, Idle: {:6.2}%", util.user, util.sys, util.idle)
}

fn format_percent(value: Option<f64>) -> String {
	match value {
		Some(v) => format!("{v:6.2}%"),
		None => "    --%".to_string(),
	}
}

fn report_lines(core_count: usize) -> usize {
	2 + core_count.div_ceil(2)
}

/// Print empty lines to prepare for display
pub fn prepare_display_area(core_count: usize) -> io::Result<()> {
	let mut stdout = io::stdout().lock();
	for _ in 0..report_lines(core_count) {
		writeln!(stdout)?;
	}
	stdout.flush()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn undefined_percent_is_dashed() {
		assert_eq!(format_percent(None), "    --%");
		assert_eq!(format_percent(Some(12.5)), " 12.50%");
	}

	#[test]
	fn two_cores_per_row() {
		assert_eq!(report_lines(1), 3);
		assert_eq!(report_lines(4), 4);
		assert_eq!(report_lines(61), 33);
	}
}
