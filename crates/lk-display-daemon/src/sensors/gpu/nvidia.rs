//! NVIDIA GPU readings through `nvidia-smi`.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::sensors::data::{GpuReading, GpuVendor};

/// Fields requested per cycle, in output order.
const QUERY_FIELDS: &str =
    "--query-gpu=name,temperature.gpu,utilization.gpu,clocks.gr,memory.used,memory.total,fan.speed,power.draw";

/// Fan percent to RPM scale (100% ≈ 3000 RPM).
const FAN_PERCENT_TO_RPM: f64 = 30.0;

/// Errors from one tool invocation.
#[derive(Error, Debug)]
pub enum NvidiaError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status}")]
    Status { program: String, status: ExitStatus },

    #[error("unexpected output: {0:?}")]
    Parse(String),
}

/// The vendor query tool and its hard timeout.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: String,
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Runs the tool with `args`, killing it if it outlives the timeout.
    async fn run(&self, args: &[&str]) -> Result<String, NvidiaError> {
        let mut command = Command::new(&self.program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| NvidiaError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| NvidiaError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(NvidiaError::Status {
                program: self.program.clone(),
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Returns true if the tool runs and reports at least one GPU.
    pub async fn probe(&self) -> bool {
        match self
            .run(&["--query-gpu=name", "--format=csv,noheader"])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("NVIDIA probe failed: {}", e);
                false
            }
        }
    }

    async fn query(&self) -> Result<GpuReading, NvidiaError> {
        let stdout = self
            .run(&[QUERY_FIELDS, "--format=csv,noheader,nounits"])
            .await?;
        let line = stdout.lines().next().unwrap_or_default();
        parse_query_line(line).ok_or_else(|| NvidiaError::Parse(line.to_string()))
    }

    /// Reads all metrics in one invocation.
    pub async fn read(&self) -> GpuReading {
        match self.query().await {
            Ok(reading) => reading,
            Err(e) => {
                debug!("nvidia-smi failed: {}", e);
                GpuReading::for_vendor(GpuVendor::Nvidia)
            }
        }
    }
}

/// Parses a numeric field; `[N/A]` and friends become `None`.
fn parse_field(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

/// Parses one CSV line of the per-cycle query.
pub fn parse_query_line(line: &str) -> Option<GpuReading> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 8 {
        return None;
    }

    let memory_used = parse_field(parts[4]).unwrap_or(0.0);
    let memory_total = match parse_field(parts[5]) {
        Some(total) if total > 0.0 => total,
        _ => 1.0,
    };

    Some(GpuReading {
        name: parts[0].to_string(),
        temperature: parse_field(parts[1]).unwrap_or(0.0),
        usage: parse_field(parts[2]).unwrap_or(0.0),
        frequency: parse_field(parts[3]).unwrap_or(0.0),
        memory_usage: memory_used / memory_total * 100.0,
        fan_rpm: parse_field(parts[6])
            .map(|percent| (percent * FAN_PERCENT_TO_RPM) as u32)
            .unwrap_or(0),
        power: parse_field(parts[7]).unwrap_or(0.0),
        vendor: GpuVendor::Nvidia,
        valid: true,
    })
}
