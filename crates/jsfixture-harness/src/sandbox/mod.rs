//! Execution sandbox
//!
//! Runs one block's code against a fresh engine and records its console
//! output. After the top-level code returns, queued work drains in ticks:
//! every microtask, then the earliest timer, then microtasks again, until
//! both queues are empty or the wall-clock budget runs out.

mod host;
mod watchdog;

pub use host::{CapturedLine, ConsoleLevel, Host, LineKind, TimerId};

use jsfixture_core::{JsValue, Thrown, TimeZone, render_uncaught};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::HarnessConfig;
use watchdog::Watchdog;

/// How a script run ended abnormally, as reported by the engine
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// A JavaScript value escaped the code being run
    #[error("{}", render_uncaught(.0).text)]
    Throw(JsValue),

    /// The engine saw the interrupt flag and stopped
    #[error("execution interrupted")]
    Interrupted,

    /// Failure inside the engine itself
    #[error("engine error: {0}")]
    Engine(String),
}

impl From<Thrown> for ScriptError {
    fn from(thrown: Thrown) -> Self {
        Self::Throw(thrown.0)
    }
}

/// A JavaScript evaluator bound to one fresh world
pub trait Engine {
    /// The engine's own handle for a queued microtask or timer callback
    type Job;

    /// Run a block's top-level code
    fn evaluate(&mut self, source: &str, host: &mut Host<Self::Job>) -> Result<(), ScriptError>;

    /// Run one queued callback
    fn run_job(&mut self, job: Self::Job, host: &mut Host<Self::Job>) -> Result<(), ScriptError>;
}

/// Builds a new engine, with a new global object and new prototypes, per block
pub trait EngineFactory {
    type Engine: Engine;

    fn create(&self) -> Self::Engine;
}

impl<F, E> EngineFactory for F
where
    F: Fn() -> E,
    E: Engine,
{
    type Engine = E;

    fn create(&self) -> E {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    TimedOut,
    Panicked(String),
}

/// Output of one block run
#[derive(Debug, Clone)]
pub struct Execution {
    pub lines: Vec<CapturedLine>,
    pub status: ExecutionStatus,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    timeout: Duration,
    time_zone: TimeZone,
    report_unhandled_rejections: bool,
}

impl Sandbox {
    pub fn new(timeout: Duration, time_zone: TimeZone) -> Self {
        Self {
            timeout,
            time_zone,
            report_unhandled_rejections: false,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.timeout(), config.time_zone())
            .with_unhandled_rejections(config.report_unhandled_rejections)
    }

    pub fn with_unhandled_rejections(mut self, report: bool) -> Self {
        self.report_unhandled_rejections = report;
        self
    }

    /// Run `code` in a fresh engine from `factory`. Never fails: timeouts
    /// and engine panics end up as diagnostic lines in the result.
    pub fn run<F: EngineFactory>(&self, factory: &F, code: &str) -> Execution {
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut host = Host::new(self.time_zone.clone(), Arc::clone(&interrupt))
            .with_unhandled_rejections(self.report_unhandled_rejections);

        let start = Instant::now();
        let watchdog = Watchdog::arm(self.timeout, interrupt);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut engine = factory.create();
            drive(&mut engine, &mut host, code)
        }));
        drop(watchdog);

        let status = match result {
            Ok(Ok(())) => ExecutionStatus::Completed,
            Ok(Err(_)) => {
                let budget = self.timeout.as_millis();
                tracing::warn!(
                    budget_ms = budget as u64,
                    pending_timers = host.pending_timers(),
                    "block timed out"
                );
                host.diagnostic(format!("<timeout after {budget}ms>"));
                ExecutionStatus::TimedOut
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(panic = %message, "engine panicked");
                host.diagnostic(format!("<engine panic: {message}>"));
                ExecutionStatus::Panicked(message)
            }
        };

        Execution {
            lines: host.into_lines(),
            status,
            duration: start.elapsed(),
        }
    }
}

/// Evaluate the top-level code, then drain queued work. Only an interrupt
/// stops the run early; throws and engine errors become captured lines.
fn drive<E: Engine>(engine: &mut E, host: &mut Host<E::Job>, code: &str) -> Result<(), ScriptError> {
    tracing::debug!("evaluating top-level code");
    settle(engine.evaluate(code, host), host)?;

    loop {
        let mut drained = 0usize;
        while let Some(job) = host.next_microtask() {
            interrupted(host)?;
            settle(engine.run_job(job, host), host)?;
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!(drained, "microtask checkpoint");
        }

        interrupted(host)?;
        let Some((id, job)) = host.next_timer() else {
            break;
        };
        tracing::debug!(timer = id.0, at_ms = host.now_ms(), "firing timer");
        let outcome = engine.run_job(job, host);
        host.end_timer();
        settle(outcome, host)?;
    }
    Ok(())
}

fn interrupted<J>(host: &Host<J>) -> Result<(), ScriptError> {
    if host.is_interrupted() {
        Err(ScriptError::Interrupted)
    } else {
        Ok(())
    }
}

fn settle<J>(outcome: Result<(), ScriptError>, host: &mut Host<J>) -> Result<(), ScriptError> {
    match outcome {
        Ok(()) => Ok(()),
        Err(ScriptError::Throw(value)) => {
            host.report_uncaught(&value);
            Ok(())
        }
        Err(ScriptError::Engine(message)) => {
            tracing::warn!(error = %message, "engine reported an internal error");
            host.diagnostic(format!("<engine error: {message}>"));
            Ok(())
        }
        Err(ScriptError::Interrupted) => Err(ScriptError::Interrupted),
    }
}

/// Extract a readable message from a caught panic.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
