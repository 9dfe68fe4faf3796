//! Interpreter configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// How the branch combiner treats failing branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Run every branch, then report all failures together.
    #[default]
    Exhaustive,
    /// Stop at the first failing branch.
    Lazy,
}

/// Interpreter and worker pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct InterpreterConfig {
    /// Branch combination strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// Maximum nesting of tactic evaluation before failing fatally.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Async worker threads of the racing pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Upper bound on threads running racing branches at once. A branch
    /// holds its thread while races nested inside it run, so races nested
    /// deeper than this run their branches sequentially.
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,

    /// Stack size of pool threads, in MiB. Racing branches recurse deeply.
    #[serde(default = "default_thread_stack_size_mib")]
    pub thread_stack_size_mib: usize,

    /// How long dropping the pool waits for branches to observe cancellation.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_max_depth() -> usize {
    512
}
fn default_worker_threads() -> usize {
    4
}
fn default_max_blocking_threads() -> usize {
    64
}
fn default_thread_stack_size_mib() -> usize {
    8
}
fn default_shutdown_grace_ms() -> u64 {
    500
}

impl InterpreterConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Log warnings for settings that will misbehave at runtime.
    pub fn validate(&self) {
        if self.max_depth == 0 {
            tracing::warn!("max_depth = 0, every tactic evaluation will fail fatally");
        }
        if self.worker_threads == 0 {
            tracing::warn!("worker_threads = 0, the pool will use 1 thread instead");
        }
        if self.max_blocking_threads < 2 {
            tracing::warn!(
                max_blocking_threads = self.max_blocking_threads,
                "Fewer than 2 blocking threads, racing branches beyond the first run on the calling thread one at a time"
            );
        }
        if self.thread_stack_size_mib < 2 {
            tracing::warn!(
                thread_stack_size_mib = self.thread_stack_size_mib,
                max_depth = self.max_depth,
                "Small thread stacks may overflow before max_depth is reached"
            );
        }
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_depth: default_max_depth(),
            worker_threads: default_worker_threads(),
            max_blocking_threads: default_max_blocking_threads(),
            thread_stack_size_mib: default_thread_stack_size_mib(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// Top-level structure of an interpreter config file.
#[derive(Debug, Default, Deserialize)]
pub struct InterpreterToml {
    #[serde(default)]
    pub interpreter: InterpreterConfig,
}

/// Load the `[interpreter]` table from a TOML file.
pub fn load_interpreter_toml(path: &Path) -> anyhow::Result<InterpreterConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: InterpreterToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded interpreter config");
    config.interpreter.validate();
    Ok(config.interpreter)
}
