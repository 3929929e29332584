use std::io;

use crate::counters::CounterKind;

/// Tick counters from one `cpu` line of `/proc/stat`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
	pub user: u64,
	pub nice: u64,
	pub system: u64,
	pub idle: u64,
	pub iowait: u64,
	pub irq: u64,
	pub softirq: u64,
	pub steal: u64,
}

impl CpuStats {
	/// The counter the device interface calls `kind`
	pub fn get(&self, kind: CounterKind) -> u64 {
		match kind {
			CounterKind::Idle => self.idle,
			CounterKind::Nice => self.nice,
			CounterKind::Sys => self.system,
			CounterKind::User => self.user,
		}
	}

	fn parse(fields: &[&str]) -> Option<Self> {
		let field = |i: usize| fields.get(i).and_then(|v| v.parse::<u64>().ok());

		Some(Self {
			user: field(0)?,
			nice: field(1)?,
			system: field(2)?,
			idle: field(3)?,
			iowait: field(4).unwrap_or(0),
			irq: field(5).unwrap_or(0),
			softirq: field(6).unwrap_or(0),
			steal: field(7).unwrap_or(0),
		})
	}
}

/// The `cpu` lines of one `/proc/stat` read
#[derive(Debug, Clone, Default)]
pub struct ProcStat {
	/// The aggregate `cpu ` line
	pub total: CpuStats,
	/// `cpuN` lines ordered by N
	pub cpus: Vec<(usize, CpuStats)>,
}

impl ProcStat {
	/// Parses the contents of `/proc/stat`
	pub fn parse(contents: &str) -> io::Result<Self> {
		let mut total = None;
		let mut cpus = Vec::new();

		for line in contents.lines() {
			if !line.starts_with("cpu") {
				continue;
			}
			let parts: Vec<&str> = line.split_whitespace().collect();
			let Some((label, values)) = parts.split_first() else {
				continue;
			};
			let stats = CpuStats::parse(values)
				.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("malformed stat line: {line}")))?;

			if *label == "cpu" {
				total = Some(stats);
			} else if let Ok(cpu_id) = label[3..].parse::<usize>() {
				cpus.push((cpu_id, stats));
			}
		}

		cpus.sort_by_key(|&(cpu_id, _)| cpu_id);

		let total =
			total.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing aggregate cpu line"))?;
		Ok(Self { total, cpus })
	}

	/// One counter per logical CPU, in CPU order
	pub fn per_cpu(&self, kind: CounterKind) -> Vec<u64> {
		self.cpus.iter().map(|(_, stats)| stats.get(kind)).collect()
	}
}
