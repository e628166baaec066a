//! Monitoring scope for long-running management commands.
//!
//! When `enable_command_monitoring` is set, [`monitor_management_command`]
//! starts a function trace (named by `command_trace_name`, default
//! `catalog.command`) and names the monitoring transaction after the
//! command. When disabled the returned guard does nothing. The decision is
//! made once, when the guard is created; the wrapped work runs either way.

use std::future::Future;
use std::time::Instant;

use tracing::{info, Instrument, Span};

use crate::config::CatalogConfig;

/// Monitoring agent the command scope reports to.
pub trait MonitoringBackend: Send + Sync {
    /// Start a function trace. The returned span covers the wrapped work.
    fn function_trace(&self, name: &str) -> Span;

    /// Name the current monitoring transaction.
    fn set_transaction_name(&self, name: &str);
}

/// Backend that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl MonitoringBackend for TracingMonitor {
    fn function_trace(&self, name: &str) -> Span {
        tracing::info_span!("function_trace", trace = %name)
    }

    fn set_transaction_name(&self, name: &str) {
        info!(event = "monitoring.transaction_name", transaction = %name);
    }
}

/// Scope guard returned by [`monitor_management_command`].
///
/// Dropping the guard closes the function trace.
#[must_use = "the monitoring scope ends when the guard is dropped"]
#[derive(Debug)]
pub struct CommandMonitor {
    command: String,
    trace: Option<Span>,
    started: Instant,
}

impl CommandMonitor {
    fn disabled(command: &str) -> Self {
        Self {
            command: command.to_string(),
            trace: None,
            started: Instant::now(),
        }
    }

    /// Whether monitoring calls were made for this scope.
    pub fn is_active(&self) -> bool {
        self.trace.is_some()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run synchronous work inside the scope.
    pub fn run<T>(&self, work: impl FnOnce() -> T) -> T {
        match &self.trace {
            Some(span) => span.in_scope(work),
            None => work(),
        }
    }

    /// Run a future inside the scope.
    pub async fn run_async<F: Future>(&self, work: F) -> F::Output {
        match &self.trace {
            Some(span) => work.instrument(span.clone()).await,
            None => work.await,
        }
    }
}

impl Drop for CommandMonitor {
    fn drop(&mut self) {
        if let Some(span) = &self.trace {
            span.in_scope(|| {
                info!(
                    event = "command.monitored",
                    command = %self.command,
                    elapsed_ms = self.started.elapsed().as_millis() as u64,
                );
            });
        }
    }
}

/// Open a monitoring scope for `command`.
///
/// Exactly one `function_trace` and one `set_transaction_name` call are made
/// when monitoring is enabled, none otherwise.
pub fn monitor_management_command(
    config: &CatalogConfig,
    backend: &dyn MonitoringBackend,
    command: &str,
) -> CommandMonitor {
    if !config.enable_command_monitoring {
        return CommandMonitor::disabled(command);
    }

    let trace = backend.function_trace(config.command_trace_name());
    trace.in_scope(|| backend.set_transaction_name(command));

    CommandMonitor {
        command: command.to_string(),
        trace: Some(trace),
        started: Instant::now(),
    }
}
