use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::counters::CounterKind;
use crate::device::Device;
use crate::error::DeviceError;
use crate::util::cpu::ProcStat;

/// Device backed by the host's procfs
///
/// Each query re-reads the relevant file, so consecutive per-core queries
/// can observe different instants just like on the accelerator.
#[derive(Debug, Clone)]
pub struct HostDevice {
	name: String,
	proc_root: PathBuf,
	tick_rate: Option<u32>,
}

impl HostDevice {
	pub fn new(proc_root: impl AsRef<Path>) -> Self {
		let proc_root = proc_root.as_ref().to_path_buf();
		Self {
			name: format!("host ({})", proc_root.display()),
			proc_root,
			tick_rate: None,
		}
	}

	/// Uses a fixed tick rate instead of asking the kernel
	pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
		self.tick_rate = Some(tick_rate);
		self
	}

	fn read(&self, file: &str) -> Result<String, DeviceError> {
		let path = self.proc_root.join(file);
		debug!(path = %path.display(), "reading");
		fs::read_to_string(&path).map_err(|e| match e.kind() {
			io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied(path.display().to_string()),
			_ => DeviceError::Io(e),
		})
	}

	fn stat(&self) -> Result<ProcStat, DeviceError> {
		let contents = self.read("stat")?;
		ProcStat::parse(&contents).map_err(|e| DeviceError::Malformed(e.to_string()))
	}

	fn uptime_secs(&self) -> Result<f64, DeviceError> {
		let contents = self.read("uptime")?;
		contents
			.split_whitespace()
			.next()
			.and_then(|v| v.parse::<f64>().ok())
			.ok_or_else(|| DeviceError::Malformed(format!("unexpected uptime contents: {:?}", contents.trim())))
	}
}

impl Device for HostDevice {
	fn name(&self) -> &str {
		&self.name
	}

	fn core_count(&self) -> Result<usize, DeviceError> {
		Ok(self.stat()?.cpus.len())
	}

	/// Always 1: each `cpuN` line is one logical CPU, not a physical core
	/// summed over its hardware threads.
	fn threads_per_core(&self) -> Result<u32, DeviceError> {
		Ok(1)
	}

	fn jiffy_counter(&self) -> Result<u64, DeviceError> {
		let ticks = self.uptime_secs()? * f64::from(self.tick_rate()?);
		Ok(ticks as u64)
	}

	fn tick_rate(&self) -> Result<u32, DeviceError> {
		if let Some(rate) = self.tick_rate {
			return Ok(rate);
		}

		// SAFETY: sysconf has no preconditions
		let rate = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
		if rate <= 0 {
			return Err(DeviceError::Io(io::Error::last_os_error()));
		}
		u32::try_from(rate).map_err(|_| DeviceError::Malformed(format!("clock tick rate {rate} out of range")))
	}

	fn per_core(&self, kind: CounterKind) -> Result<Vec<u64>, DeviceError> {
		Ok(self.stat()?.per_cpu(kind))
	}

	fn sum(&self, kind: CounterKind) -> Result<u64, DeviceError> {
		Ok(self.stat()?.total.get(kind))
	}
}
