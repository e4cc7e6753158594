//! Output normalization
//!
//! Maps logged values to the text fixtures expect. A value passed directly to
//! `console.log` is rendered in full; a value found inside an array or object
//! is rendered as a short preview (`Array(6)`, `Object`, `ƒ`), matching the
//! one-level object summaries in recorded fixture output.

use crate::date;
use crate::number::number_to_string;
use crate::value::{JsValue, ObjectKind, ObjectRef, PromiseState, Property, PropertyKey, PropertySlot};

/// Marker emitted for values with no rendering rule
pub const UNPRINTABLE: &str = "<unprintable>";

/// Text of one console emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub text: String,
    /// Set when any part of the line fell back to [`UNPRINTABLE`]
    pub unprintable: bool,
}

#[derive(Default)]
struct Renderer {
    unprintable: bool,
}

impl Renderer {
    fn finish(self, text: String) -> RenderedLine {
        RenderedLine {
            text,
            unprintable: self.unprintable,
        }
    }

    fn primitive(value: &JsValue) -> Option<String> {
        match value {
            JsValue::Undefined => Some("undefined".to_string()),
            JsValue::Null => Some("null".to_string()),
            JsValue::Boolean(b) => Some(b.to_string()),
            // Console shows the sign that ToString drops
            JsValue::Number(n) if *n == 0.0 && n.is_sign_negative() => Some("-0".to_string()),
            JsValue::Number(n) => Some(number_to_string(*n)),
            JsValue::String(s) => Some(s.clone()),
            JsValue::Symbol(sym) => Some(sym.descriptive_string()),
            JsValue::Object(_) => None,
        }
    }

    fn unprintable(&mut self, obj: &ObjectRef) -> String {
        tracing::warn!(class = %obj.class_name(), "no rendering rule for host object");
        self.unprintable = true;
        UNPRINTABLE.to_string()
    }

    fn top_level(&mut self, value: &JsValue) -> String {
        let JsValue::Object(obj) = value else {
            return Self::primitive(value).unwrap_or_default();
        };
        let kind = obj.borrow().kind.clone();
        match kind {
            ObjectKind::Function(data) => data.source_text(),
            ObjectKind::Error { .. } => error_text(obj),
            ObjectKind::RegExp { source, flags } => format!("/{source}/{flags}"),
            ObjectKind::Date { time, zone } => date::to_date_string(time, &zone),
            ObjectKind::Primitive(primitive) => self.top_level(&primitive),
            ObjectKind::Promise(state) => match state {
                PromiseState::Pending => "Promise {<pending>}".to_string(),
                PromiseState::Fulfilled(v) => format!("Promise {{<fulfilled>: {}}}", self.nested(&v)),
                PromiseState::Rejected(v) => format!("Promise {{<rejected>: {}}}", self.nested(&v)),
            },
            ObjectKind::Host { .. } => self.unprintable(obj),
            ObjectKind::Array { length, .. } => {
                let mut parts = Vec::new();
                for index in 0..length {
                    parts.push(match obj.get_own_property(&PropertyKey::from(index)) {
                        Some(property) => self.property_preview(&property),
                        None => "undefined".to_string(),
                    });
                }
                parts.extend(self.named_entries(obj, true));
                format!("[{}]", parts.join(", "))
            }
            ObjectKind::Ordinary => {
                let entries = self.named_entries(obj, false);
                format!("{{{}}}", entries.join(", "))
            }
        }
    }

    /// `key: preview` for enumerable own properties; array indices are
    /// skipped for arrays since they were already listed positionally
    fn named_entries(&mut self, obj: &ObjectRef, skip_indices: bool) -> Vec<String> {
        let keys = obj.own_keys();
        let mut entries = Vec::new();
        for key in keys {
            if skip_indices && key.array_index().is_some() {
                continue;
            }
            let Some(property) = obj.get_own_property(&key) else {
                continue;
            };
            if !property.enumerable {
                continue;
            }
            let preview = self.property_preview(&property);
            entries.push(format!("{key}: {preview}"));
        }
        entries
    }

    /// Accessors are shown as `(...)` and never invoked
    fn property_preview(&mut self, property: &Property) -> String {
        match &property.slot {
            PropertySlot::Data { value, .. } => self.nested(value),
            PropertySlot::Accessor { .. } => "(...)".to_string(),
        }
    }

    fn nested(&mut self, value: &JsValue) -> String {
        let JsValue::Object(obj) = value else {
            return Self::primitive(value).unwrap_or_default();
        };
        let kind = obj.borrow().kind.clone();
        match kind {
            ObjectKind::Ordinary => "Object".to_string(),
            ObjectKind::Array { length, .. } => format!("Array({length})"),
            ObjectKind::Function(_) => "ƒ".to_string(),
            ObjectKind::Error { .. } => error_text(obj),
            ObjectKind::RegExp { source, flags } => format!("/{source}/{flags}"),
            ObjectKind::Date { time, zone } => date::to_date_string(time, &zone),
            ObjectKind::Primitive(_) | ObjectKind::Promise(_) => obj.class_name(),
            ObjectKind::Host { .. } => self.unprintable(obj),
        }
    }
}

/// `Name: message`, or just the name when the message is empty
fn error_text(obj: &ObjectRef) -> String {
    match obj.error_parts() {
        Some((name, message)) if message.is_empty() => name,
        Some((name, message)) if name.is_empty() => message,
        Some((name, message)) => format!("{name}: {message}"),
        None => obj.class_name(),
    }
}

/// Render one value as passed directly to `console.log`
pub fn render_value(value: &JsValue) -> RenderedLine {
    let mut renderer = Renderer::default();
    let text = renderer.top_level(value);
    renderer.finish(text)
}

/// Render a full `console.log(a, b, ...)` call: arguments joined by one space
pub fn render_log_args(args: &[JsValue]) -> RenderedLine {
    let mut renderer = Renderer::default();
    let text = args
        .iter()
        .map(|arg| renderer.top_level(arg))
        .collect::<Vec<_>>()
        .join(" ");
    renderer.finish(text)
}

/// Preview of a value as it appears inside an array or object
pub fn render_nested(value: &JsValue) -> String {
    Renderer::default().nested(value)
}

/// Text reported for a value thrown out of sandboxed code: `Uncaught Name: message`
/// for Error objects, the bare rendered value for anything else
pub fn render_uncaught(value: &JsValue) -> RenderedLine {
    if let Some(obj) = value.as_object() {
        if obj.error_parts().is_some() {
            return RenderedLine {
                text: format!("Uncaught {}", error_text(obj)),
                unprintable: false,
            };
        }
    }
    render_value(value)
}
