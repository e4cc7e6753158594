//! Host side of one sandboxed block run
//!
//! Everything an engine calls back into while running a block: console
//! capture, the microtask queue and the timer heap. Timers run on a virtual
//! clock, so delays order callbacks without making the harness sleep.

use jsfixture_core::{JsValue, TimeZone, render_log_args, render_uncaught, render_value};
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// HTML timer rule: timers nested deeper than this are clamped to MIN_TIMEOUT_MS
const MAX_TIMER_NESTING_LEVEL: u32 = 5;
/// Minimum delay for deeply nested timers
const MIN_TIMEOUT_MS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// What produced a captured line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Log(ConsoleLevel),
    /// A throw that escaped the block's code or one of its callbacks
    Uncaught,
    /// Harness note (timeout, engine panic); never matches expected output
    Diagnostic,
}

/// One console emission, already normalized to fixture text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedLine {
    pub kind: LineKind,
    pub text: String,
    pub unprintable: bool,
}

impl CapturedLine {
    pub fn log(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Log(level),
            text: text.into(),
            unprintable: false,
        }
    }

    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Diagnostic,
            text: text.into(),
            unprintable: false,
        }
    }

    /// Lines that fail a comparison no matter what was expected
    pub fn forces_failure(&self) -> bool {
        self.unprintable || self.kind == LineKind::Diagnostic
    }
}

/// Handle returned by [`Host::set_timeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

struct PendingTimer<J> {
    job: J,
    nesting_level: u32,
}

/// Heap entry ordered so the earliest due timer pops first, ties by scheduling order
#[derive(Debug, PartialEq, Eq)]
struct TimerHeapEntry {
    due_ms: u64,
    id: TimerId,
}

impl PartialOrd for TimerHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerHeapEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse order for min-heap behavior
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Per-run host state, generic over the engine's callback handle `J`
pub struct Host<J> {
    lines: Vec<CapturedLine>,
    microtasks: VecDeque<J>,
    timer_heap: BinaryHeap<TimerHeapEntry>,
    timers: HashMap<TimerId, PendingTimer<J>>,
    next_timer_id: u64,
    clock_ms: u64,
    nesting_level: u32,
    interrupt: Arc<AtomicBool>,
    time_zone: TimeZone,
    report_unhandled_rejections: bool,
}

impl<J> Host<J> {
    pub fn new(time_zone: TimeZone, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            lines: Vec::new(),
            microtasks: VecDeque::new(),
            timer_heap: BinaryHeap::new(),
            timers: HashMap::new(),
            next_timer_id: 1,
            clock_ms: 0,
            nesting_level: 0,
            interrupt,
            time_zone,
            report_unhandled_rejections: false,
        }
    }

    pub fn with_unhandled_rejections(mut self, report: bool) -> Self {
        self.report_unhandled_rejections = report;
        self
    }

    /// `console.<level>(...args)`
    pub fn console(&mut self, level: ConsoleLevel, args: &[JsValue]) {
        let rendered = render_log_args(args);
        if rendered.unprintable {
            tracing::warn!(level = level.name(), text = %rendered.text, "logged value has no rendering");
        }
        self.lines.push(CapturedLine {
            kind: LineKind::Log(level),
            text: rendered.text,
            unprintable: rendered.unprintable,
        });
    }

    pub fn log(&mut self, args: &[JsValue]) {
        self.console(ConsoleLevel::Log, args);
    }

    pub fn enqueue_microtask(&mut self, job: J) {
        self.microtasks.push_back(job);
    }

    /// `setTimeout(job, delay)`; negative, NaN and infinite delays count as 0
    pub fn set_timeout(&mut self, job: J, delay_ms: f64) -> TimerId {
        let delay = if delay_ms.is_finite() && delay_ms > 0.0 {
            delay_ms.min(i32::MAX as f64) as u64
        } else {
            0
        };
        let nesting_level = self.nesting_level.saturating_add(1);
        let delay = if nesting_level > MAX_TIMER_NESTING_LEVEL {
            delay.max(MIN_TIMEOUT_MS)
        } else {
            delay
        };

        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;
        let due_ms = self.clock_ms + delay;
        self.timer_heap.push(TimerHeapEntry { due_ms, id });
        self.timers.insert(id, PendingTimer { job, nesting_level });
        id
    }

    /// `clearTimeout(id)`; unknown or already fired ids are ignored
    pub fn clear_timeout(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    /// Virtual milliseconds elapsed since the block started
    pub fn now_ms(&self) -> f64 {
        self.clock_ms as f64
    }

    /// Flag set by the watchdog when the block's budget runs out.
    /// Long-running engine loops should poll it and return `ScriptError::Interrupted`.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// A promise was rejected and no handler observed it by the end of its turn
    pub fn unhandled_rejection(&mut self, reason: &JsValue) {
        if !self.report_unhandled_rejections {
            tracing::debug!(reason = ?reason, "unhandled rejection not reported");
            return;
        }
        let rendered = render_value(reason);
        self.lines.push(CapturedLine {
            kind: LineKind::Uncaught,
            text: format!("Uncaught (in promise) {}", rendered.text),
            unprintable: rendered.unprintable,
        });
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.time_zone
    }

    pub fn captured(&self) -> &[CapturedLine] {
        &self.lines
    }

    pub(crate) fn report_uncaught(&mut self, value: &JsValue) {
        let rendered = render_uncaught(value);
        self.lines.push(CapturedLine {
            kind: LineKind::Uncaught,
            text: rendered.text,
            unprintable: rendered.unprintable,
        });
    }

    pub(crate) fn diagnostic(&mut self, text: impl Into<String>) {
        self.lines.push(CapturedLine::diagnostic(text));
    }

    pub(crate) fn next_microtask(&mut self) -> Option<J> {
        self.microtasks.pop_front()
    }

    /// Pop the earliest live timer and advance the clock to its due time.
    /// Callers must pair this with [`Host::end_timer`].
    pub(crate) fn next_timer(&mut self) -> Option<(TimerId, J)> {
        while let Some(entry) = self.timer_heap.pop() {
            let Some(timer) = self.timers.remove(&entry.id) else {
                continue;
            };
            self.clock_ms = self.clock_ms.max(entry.due_ms);
            self.nesting_level = timer.nesting_level;
            return Some((entry.id, timer.job));
        }
        None
    }

    pub(crate) fn end_timer(&mut self) {
        self.nesting_level = 0;
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn into_lines(self) -> Vec<CapturedLine> {
        self.lines
    }
}
