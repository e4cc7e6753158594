//! Scripted engine for driving the harness without a JavaScript evaluator.
//!
//! Each block's code is matched against a table of markers; the first marker
//! found in the code selects a Rust closure that makes the same host calls
//! the JavaScript would.

#![allow(dead_code)]

use jsfixture_core::{JsValue, ObjectRef, PromiseState};
use jsfixture_harness::{Engine, Host, ScriptError};
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A queued callback
pub struct Job(Box<dyn FnOnce(&mut Host<Job>) -> Result<(), ScriptError>>);

impl Job {
    pub fn new(run: impl FnOnce(&mut Host<Job>) -> Result<(), ScriptError> + 'static) -> Self {
        Self(Box::new(run))
    }
}

type Script = Rc<dyn Fn(&ObjectRef, &mut Host<Job>) -> Result<(), ScriptError>>;

#[derive(Default)]
pub struct ScriptBook {
    entries: Vec<(&'static str, Script)>,
}

impl ScriptBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `script` for blocks whose code contains `marker`. The script gets
    /// the engine's own global object.
    pub fn on(
        mut self,
        marker: &'static str,
        script: impl Fn(&ObjectRef, &mut Host<Job>) -> Result<(), ScriptError> + 'static,
    ) -> Self {
        let script: Script = Rc::new(script);
        self.entries.push((marker, script));
        self
    }

    pub fn factory(self) -> impl Fn() -> ScriptedEngine {
        let scripts = Rc::new(self.entries);
        move || ScriptedEngine {
            scripts: Rc::clone(&scripts),
            global: ObjectRef::new_ordinary(),
        }
    }
}

pub struct ScriptedEngine {
    scripts: Rc<Vec<(&'static str, Script)>>,
    global: ObjectRef,
}

impl Engine for ScriptedEngine {
    type Job = Job;

    fn evaluate(&mut self, source: &str, host: &mut Host<Job>) -> Result<(), ScriptError> {
        let script = self
            .scripts
            .iter()
            .find(|(marker, _)| source.contains(marker))
            .map(|(_, script)| Rc::clone(script));
        match script {
            Some(script) => script(&self.global, host),
            None => Err(ScriptError::Throw(
                ObjectRef::new_error("SyntaxError", "Unexpected token").into(),
            )),
        }
    }

    fn run_job(&mut self, job: Job, host: &mut Host<Job>) -> Result<(), ScriptError> {
        (job.0)(host)
    }
}

pub type Handler = Rc<dyn Fn(&mut Host<Job>, JsValue) -> Result<JsValue, ScriptError>>;

pub fn handler(
    f: impl Fn(&mut Host<Job>, JsValue) -> Result<JsValue, ScriptError> + 'static,
) -> Handler {
    Rc::new(f)
}

struct Reaction {
    on_fulfilled: Option<Handler>,
    on_rejected: Option<Handler>,
    derived: Promise,
}

struct PromiseInner {
    object: ObjectRef,
    reactions: Vec<Reaction>,
    handled: bool,
}

/// Minimal promise: reactions are queued as microtasks on settlement,
/// handlers throwing reject the derived promise
#[derive(Clone)]
pub struct Promise(Rc<RefCell<PromiseInner>>);

impl Promise {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(PromiseInner {
            object: ObjectRef::new_promise(PromiseState::Pending),
            reactions: Vec::new(),
            handled: false,
        })))
    }

    pub fn object(&self) -> ObjectRef {
        self.0.borrow().object.clone()
    }

    pub fn same(&self, other: &Promise) -> bool {
        self.object().ptr_eq(&other.object())
    }

    fn is_pending(&self) -> bool {
        matches!(self.object().promise_state(), Some(PromiseState::Pending))
    }

    pub fn resolve(&self, host: &mut Host<Job>, value: JsValue) {
        self.settle(host, PromiseState::Fulfilled(value));
    }

    pub fn reject(&self, host: &mut Host<Job>, reason: JsValue) {
        let unobserved = self.is_pending() && !self.0.borrow().handled;
        self.settle(host, PromiseState::Rejected(reason.clone()));
        if unobserved {
            host.unhandled_rejection(&reason);
        }
    }

    fn settle(&self, host: &mut Host<Job>, state: PromiseState) {
        if !self.is_pending() {
            return;
        }
        let reactions = {
            let mut inner = self.0.borrow_mut();
            inner.object.set_promise_state(state.clone());
            std::mem::take(&mut inner.reactions)
        };
        for reaction in reactions {
            host.enqueue_microtask(reaction_job(reaction, state.clone()));
        }
    }

    pub fn then(
        &self,
        host: &mut Host<Job>,
        on_fulfilled: Option<Handler>,
        on_rejected: Option<Handler>,
    ) -> Promise {
        let derived = Promise::new();
        let reaction = Reaction {
            on_fulfilled,
            on_rejected,
            derived: derived.clone(),
        };
        let state = self.object().promise_state();
        match state {
            Some(PromiseState::Pending) | None => {
                let mut inner = self.0.borrow_mut();
                inner.handled = true;
                inner.reactions.push(reaction);
            }
            Some(settled) => {
                self.0.borrow_mut().handled = true;
                host.enqueue_microtask(reaction_job(reaction, settled));
            }
        }
        derived
    }

    pub fn catch(&self, host: &mut Host<Job>, on_rejected: Handler) -> Promise {
        self.then(host, None, Some(on_rejected))
    }

    pub fn finally(
        &self,
        host: &mut Host<Job>,
        on_finally: impl Fn(&mut Host<Job>) -> Result<(), ScriptError> + 'static,
    ) -> Promise {
        let on_finally = Rc::new(on_finally);
        let on_reject = Rc::clone(&on_finally);
        self.then(
            host,
            Some(handler(move |host, value| {
                on_finally(host)?;
                Ok(value)
            })),
            Some(handler(move |host, reason| {
                on_reject(host)?;
                Err(ScriptError::Throw(reason))
            })),
        )
    }
}

fn reaction_job(reaction: Reaction, state: PromiseState) -> Job {
    Job::new(move |host| {
        let (handler, argument, rejected) = match state {
            PromiseState::Fulfilled(value) => (reaction.on_fulfilled, value, false),
            PromiseState::Rejected(reason) => (reaction.on_rejected, reason, true),
            PromiseState::Pending => return Ok(()),
        };
        match handler {
            Some(handler) => match handler(host, argument) {
                Ok(value) => reaction.derived.resolve(host, value),
                Err(ScriptError::Throw(reason)) => reaction.derived.reject(host, reason),
                Err(other) => return Err(other),
            },
            None if rejected => reaction.derived.reject(host, argument),
            None => reaction.derived.resolve(host, argument),
        }
        Ok(())
    })
}

/// `JSON.parse` over serde_json; syntax errors throw a SyntaxError object
pub fn json_parse(text: &str) -> Result<JsValue, ScriptError> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|value| from_json(&value))
        .map_err(|e| {
            ScriptError::Throw(ObjectRef::new_error("SyntaxError", e.to_string()).into())
        })
}

fn from_json(value: &serde_json::Value) -> JsValue {
    match value {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => (*b).into(),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN).into(),
        serde_json::Value::String(s) => s.as_str().into(),
        serde_json::Value::Array(items) => ObjectRef::array_from(items.iter().map(from_json)).into(),
        serde_json::Value::Object(map) => {
            let obj = ObjectRef::new_ordinary();
            for (key, item) in map {
                obj.set(key.as_str().into(), from_json(item)).unwrap();
            }
            obj.into()
        }
    }
}

/// Name of a thrown error object, as `e.name` would read it
pub fn error_name(thrown: &JsValue) -> String {
    thrown
        .as_object()
        .and_then(|obj| obj.error_parts())
        .map(|(name, _)| name)
        .unwrap_or_default()
}
