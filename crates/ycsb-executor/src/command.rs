//! Building and running a single YCSB invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::YcsbError;
use crate::output::{parse_ycsb_output, YcsbOutput};

/// YCSB binding name for Cloud Datastore.
pub const DATASTORE_BINDING: &str = "googledatastore";

/// Environment variable the Datastore binding reads its service account
/// key from.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Run,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Run => "run",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-invocation settings layered over the executor's shared properties.
#[derive(Debug, Clone)]
pub struct YcsbInvocation {
    pub phase: Phase,
    pub threads: u32,
    /// Target operations per second; `None` runs unthrottled.
    pub target: Option<u64>,
    pub properties: BTreeMap<String, String>,
}

impl YcsbInvocation {
    pub fn new(phase: Phase, threads: u32) -> Self {
        Self {
            phase,
            threads: threads.max(1),
            target: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }
}

/// Runs the YCSB launcher with a fixed binding, workload file, shared
/// properties and environment.
#[derive(Debug, Clone)]
pub struct YcsbExecutor {
    binary: PathBuf,
    database: String,
    workload: PathBuf,
    properties: BTreeMap<String, String>,
    env: BTreeMap<String, String>,
}

impl YcsbExecutor {
    pub fn new(binary: impl Into<PathBuf>, workload: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            database: DATASTORE_BINDING.to_string(),
            workload: workload.into(),
            properties: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Add a `-p key=value` passed to every invocation.
    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Point the Datastore binding at a service account key file.
    pub fn with_credentials_file(self, path: &Path) -> Self {
        self.env(CREDENTIALS_ENV, path.to_string_lossy())
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Command-line arguments for `invocation`. Invocation properties
    /// override shared ones with the same key.
    pub fn command_args(&self, invocation: &YcsbInvocation) -> Vec<String> {
        let mut merged = self.properties.clone();
        merged.extend(
            invocation
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let mut args = vec![
            invocation.phase.as_str().to_string(),
            self.database.clone(),
            "-P".to_string(),
            self.workload.to_string_lossy().into_owned(),
        ];
        for (key, value) in merged {
            args.push("-p".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push("-threads".to_string());
        args.push(invocation.threads.to_string());
        if let Some(target) = invocation.target {
            args.push("-target".to_string());
            args.push(target.to_string());
        }
        args.push("-s".to_string());
        args
    }

    /// Run one YCSB process to completion and parse its measurements.
    pub async fn execute(&self, invocation: &YcsbInvocation) -> Result<YcsbOutput, YcsbError> {
        let args = self.command_args(invocation);
        tracing::debug!("Running {:?} {}", self.binary, args.join(" "));

        let mut command = Command::new(&self.binary);
        command.args(&args);
        command.envs(&self.env);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let child = command.spawn().map_err(|source| YcsbError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;
        let output = child.wait_with_output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(YcsbError::Exited {
                phase: invocation.phase,
                status: output.status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        let samples = parse_ycsb_output(&stdout);
        tracing::debug!(
            "YCSB {} finished with {} measurements",
            invocation.phase,
            samples.len()
        );
        Ok(YcsbOutput {
            stdout,
            stderr,
            samples,
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
