//! # jsfixture-core
//!
//! Host-side model of JavaScript values for the fixture harness: objects and
//! property descriptors, the abstract conversions and operators whose edge
//! cases the fixtures pin down, `Number` and `Date` string forms, and the
//! normalizer that turns logged values into fixture text.
//!
//! An evaluator plugged into the harness builds its values out of these
//! types, so coercion and stringification behave identically no matter which
//! engine produced them.

#![warn(clippy::all)]

pub mod convert;
pub mod date;
pub mod error;
pub mod format;
pub mod number;
pub mod ops;
pub mod value;

pub use convert::PreferredType;
pub use date::TimeZone;
pub use error::{ErrorKind, JsResult, Thrown};
pub use format::{RenderedLine, UNPRINTABLE, render_log_args, render_uncaught, render_value};
pub use ops::BinaryOp;
pub use value::{
    JsObject, JsValue, NativeFn, ObjectKind, ObjectRef, PromiseState, Property,
    PropertyDescriptor, PropertyKey, PropertySlot, Symbol,
};
