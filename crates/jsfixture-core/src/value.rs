//! JavaScript values, objects and property storage
//!
//! Objects live behind `Rc<RefCell<_>>` handles. A sandbox builds a fresh
//! object graph per block and drops it afterwards, so reference counting is
//! all the memory management the harness needs.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::date::TimeZone;
use crate::error::{JsResult, Thrown};

/// Signature of a callable object's behavior: `(this, arguments) -> completion`
pub type NativeFn = Rc<dyn Fn(&JsValue, &[JsValue]) -> JsResult<JsValue>>;

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Symbol(Symbol),
    Object(ObjectRef),
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(ObjectRef::is_callable)
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) if obj.is_callable() => "function",
            JsValue::Object(_) => "object",
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => f.write_str("undefined"),
            JsValue::Null => f.write_str("null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => f.write_str(&crate::number::number_to_string(*n)),
            JsValue::String(s) => write!(f, "{s:?}"),
            JsValue::Symbol(sym) => write!(f, "{sym:?}"),
            JsValue::Object(obj) => write!(f, "[object {}]", obj.class_name()),
        }
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<u32> for JsValue {
    fn from(n: u32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(s.to_string())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(s)
    }
}

impl From<Symbol> for JsValue {
    fn from(sym: Symbol) -> Self {
        JsValue::Symbol(sym)
    }
}

impl From<ObjectRef> for JsValue {
    fn from(obj: ObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

/// A symbol; identity is the allocation, not the description
#[derive(Clone)]
pub struct Symbol(Rc<Option<String>>);

impl Symbol {
    pub fn new(description: Option<&str>) -> Self {
        Self(Rc::new(description.map(str::to_string)))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// `Symbol.prototype.toString` text, e.g. `Symbol(x)`
    pub fn descriptive_string(&self) -> String {
        format!("Symbol({})", self.description().unwrap_or(""))
    }

    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptive_string())
    }
}

/// Property key: a string or a symbol
#[derive(Clone, Debug)]
pub enum PropertyKey {
    String(String),
    Symbol(Symbol),
}

impl PropertyKey {
    /// The key's array index, if it is a canonical numeric string below 2^32 - 1
    pub fn array_index(&self) -> Option<u32> {
        let PropertyKey::String(s) = self else {
            return None;
        };
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match s.parse::<u64>() {
            Ok(n) if n < u32::MAX as u64 => Some(n as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(s) => Some(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyKey::String(a), PropertyKey::String(b)) => a == b,
            (PropertyKey::Symbol(a), PropertyKey::Symbol(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => f.write_str(s),
            PropertyKey::Symbol(sym) => f.write_str(&sym.descriptive_string()),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::String(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        PropertyKey::String(index.to_string())
    }
}

impl From<Symbol> for PropertyKey {
    fn from(sym: Symbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

/// Storage half of a property
#[derive(Clone, Debug)]
pub enum PropertySlot {
    Data { value: JsValue, writable: bool },
    Accessor { get: JsValue, set: JsValue },
}

/// A fully populated own property
#[derive(Clone, Debug)]
pub struct Property {
    pub slot: PropertySlot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Data property as created by plain assignment: all attributes `true`
    pub fn data(value: JsValue) -> Self {
        Self {
            slot: PropertySlot::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Non-enumerable data property, the shape of built-in methods and `message`
    pub fn hidden(value: JsValue) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.slot, PropertySlot::Accessor { .. })
    }

    pub fn to_descriptor(&self) -> PropertyDescriptor {
        let mut desc = PropertyDescriptor {
            enumerable: Some(self.enumerable),
            configurable: Some(self.configurable),
            ..PropertyDescriptor::default()
        };
        match &self.slot {
            PropertySlot::Data { value, writable } => {
                desc.value = Some(value.clone());
                desc.writable = Some(*writable);
            }
            PropertySlot::Accessor { get, set } => {
                desc.get = Some(get.clone());
                desc.set = Some(set.clone());
            }
        }
        desc
    }
}

/// A possibly partial property descriptor, as passed to `Object.defineProperty`
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<JsValue>,
    pub set: Option<JsValue>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Descriptor carrying only a value; every omitted attribute defaults to `false`
    pub fn value(value: JsValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// ToPropertyDescriptor: read a descriptor out of an object
    pub fn from_object(obj: &ObjectRef) -> JsResult<Self> {
        let mut desc = PropertyDescriptor::default();
        if obj.has_property(&"enumerable".into()) {
            desc.enumerable = Some(crate::convert::to_boolean(&obj.get(&"enumerable".into())?));
        }
        if obj.has_property(&"configurable".into()) {
            desc.configurable =
                Some(crate::convert::to_boolean(&obj.get(&"configurable".into())?));
        }
        if obj.has_property(&"value".into()) {
            desc.value = Some(obj.get(&"value".into())?);
        }
        if obj.has_property(&"writable".into()) {
            desc.writable = Some(crate::convert::to_boolean(&obj.get(&"writable".into())?));
        }
        for (name, slot) in [("get", &mut desc.get), ("set", &mut desc.set)] {
            if obj.has_property(&name.into()) {
                let accessor = obj.get(&name.into())?;
                if !accessor.is_undefined() && !accessor.is_callable() {
                    let label = if name == "get" { "Getter" } else { "Setter" };
                    return Err(Thrown::type_error(format!(
                        "{label} must be a function: {}",
                        crate::format::render_nested(&accessor)
                    )));
                }
                *slot = Some(accessor);
            }
        }
        if desc.is_accessor() && desc.is_data() {
            return Err(Thrown::type_error(
                "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
            ));
        }
        Ok(desc)
    }

    /// FromPropertyDescriptor: materialize as an ordinary object
    pub fn to_object(&self) -> ObjectRef {
        let obj = ObjectRef::new_ordinary();
        {
            let mut inner = obj.borrow_mut();
            let fields = [
                ("value", self.value.clone()),
                ("writable", self.writable.map(JsValue::Boolean)),
                ("get", self.get.clone()),
                ("set", self.set.clone()),
                ("enumerable", self.enumerable.map(JsValue::Boolean)),
                ("configurable", self.configurable.map(JsValue::Boolean)),
            ];
            for (name, value) in fields {
                if let Some(value) = value {
                    inner.insert(name.into(), Property::data(value));
                }
            }
        }
        obj
    }
}

/// Settlement state of a promise object
#[derive(Clone, Debug)]
pub enum PromiseState {
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

/// Data carried by a callable object
#[derive(Clone)]
pub struct FunctionData {
    pub name: String,
    /// Source text for script functions; `None` for native functions
    pub source: Option<String>,
    pub call: NativeFn,
}

impl FunctionData {
    /// `Function.prototype.toString` text
    pub fn source_text(&self) -> String {
        match &self.source {
            Some(source) => source.clone(),
            None => format!("function {}() {{ [native code] }}", self.name),
        }
    }
}

/// Internal slots that distinguish exotic and built-in objects
#[derive(Clone)]
pub enum ObjectKind {
    Ordinary,
    Array { length: u32, length_writable: bool },
    Function(FunctionData),
    Error { name: String, message: String },
    RegExp { source: String, flags: String },
    Date { time: f64, zone: TimeZone },
    /// Boolean, Number, String or Symbol wrapper object
    Primitive(JsValue),
    Promise(PromiseState),
    /// Host-provided object the normalizer has no rule for
    Host { class: String },
}

/// Object storage
pub struct JsObject {
    pub kind: ObjectKind,
    pub prototype: Option<ObjectRef>,
    pub extensible: bool,
    /// Whether `valueOf`/`toString` fall back to the built-in behavior for this
    /// object's kind when the prototype chain does not provide them.
    /// `false` models `Object.create(null)`.
    pub inherits_builtins: bool,
    properties: Vec<(PropertyKey, Property)>,
}

impl JsObject {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            prototype: None,
            extensible: true,
            inherits_builtins: true,
            properties: Vec::new(),
        }
    }

    fn position(&self, key: &PropertyKey) -> Option<usize> {
        self.properties.iter().position(|(k, _)| k == key)
    }

    /// Raw insert or overwrite, bypassing attribute validation
    pub fn insert(&mut self, key: PropertyKey, property: Property) {
        if let (ObjectKind::Array { length, .. }, Some(index)) = (&mut self.kind, key.array_index()) {
            if index >= *length {
                *length = index + 1;
            }
        }
        match self.position(&key) {
            Some(pos) => self.properties[pos].1 = property,
            None => self.properties.push((key, property)),
        }
    }

    /// An index write that would grow an array whose length is read-only
    fn grows_fixed_length(&self, key: &PropertyKey) -> bool {
        match (&self.kind, key.array_index()) {
            (
                ObjectKind::Array {
                    length,
                    length_writable: false,
                },
                Some(index),
            ) => index >= *length,
            _ => false,
        }
    }

    pub fn own_property(&self, key: &PropertyKey) -> Option<Property> {
        if let ObjectKind::Array {
            length,
            length_writable,
        } = self.kind
        {
            if key.as_str() == Some("length") {
                return Some(Property {
                    slot: PropertySlot::Data {
                        value: JsValue::from(length),
                        writable: length_writable,
                    },
                    enumerable: false,
                    configurable: false,
                });
            }
        }
        if let ObjectKind::Primitive(JsValue::String(s)) = &self.kind {
            if key.as_str() == Some("length") {
                return Some(Property {
                    slot: PropertySlot::Data {
                        value: JsValue::from(s.encode_utf16().count() as u32),
                        writable: false,
                    },
                    enumerable: false,
                    configurable: false,
                });
            }
            if let Some(unit) = key
                .array_index()
                .and_then(|index| s.encode_utf16().nth(index as usize))
            {
                return Some(Property {
                    slot: PropertySlot::Data {
                        value: JsValue::String(String::from_utf16_lossy(&[unit])),
                        writable: false,
                    },
                    enumerable: true,
                    configurable: false,
                });
            }
        }
        self.position(key).map(|pos| self.properties[pos].1.clone())
    }

    /// OrdinaryOwnPropertyKeys: integer indices ascending, then strings and
    /// symbols in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = self
            .properties
            .iter()
            .filter_map(|(k, _)| k.array_index())
            .collect();
        if let ObjectKind::Primitive(JsValue::String(s)) = &self.kind {
            indices.extend(0..s.encode_utf16().count() as u32);
        }
        indices.sort_unstable();
        indices.dedup();

        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::from).collect();
        if matches!(
            self.kind,
            ObjectKind::Array { .. } | ObjectKind::Primitive(JsValue::String(_))
        ) {
            keys.push("length".into());
        }
        keys.extend(
            self.properties
                .iter()
                .filter(|(k, _)| !k.is_symbol() && k.array_index().is_none())
                .map(|(k, _)| k.clone()),
        );
        keys.extend(
            self.properties
                .iter()
                .filter(|(k, _)| k.is_symbol())
                .map(|(k, _)| k.clone()),
        );
        keys
    }

    fn remove(&mut self, key: &PropertyKey) {
        if let Some(pos) = self.position(key) {
            self.properties.remove(pos);
        }
    }
}

/// Shared handle to a heap object
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<JsObject>>);

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[object {}]", self.class_name())
    }
}

impl ObjectRef {
    pub fn new(object: JsObject) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    pub fn with_kind(kind: ObjectKind) -> Self {
        Self::new(JsObject::new(kind))
    }

    pub fn new_ordinary() -> Self {
        Self::with_kind(ObjectKind::Ordinary)
    }

    /// `Object.create(proto)`
    pub fn create(prototype: Option<ObjectRef>) -> Self {
        let obj = Self::new_ordinary();
        {
            let mut inner = obj.borrow_mut();
            inner.inherits_builtins = prototype.is_some();
            inner.prototype = prototype;
        }
        obj
    }

    /// Array with holes where an element is `None`
    pub fn new_array(elements: Vec<Option<JsValue>>) -> Self {
        let obj = Self::with_kind(ObjectKind::Array {
            length: elements.len() as u32,
            length_writable: true,
        });
        {
            let mut inner = obj.borrow_mut();
            for (index, element) in elements.into_iter().enumerate() {
                if let Some(value) = element {
                    inner.insert(PropertyKey::from(index as u32), Property::data(value));
                }
            }
        }
        obj
    }

    pub fn array_from(values: impl IntoIterator<Item = JsValue>) -> Self {
        Self::new_array(values.into_iter().map(Some).collect())
    }

    /// Script function with its declaration source text
    pub fn new_function(
        name: &str,
        source: impl Into<String>,
        call: impl Fn(&JsValue, &[JsValue]) -> JsResult<JsValue> + 'static,
    ) -> Self {
        Self::with_kind(ObjectKind::Function(FunctionData {
            name: name.to_string(),
            source: Some(source.into()),
            call: Rc::new(call),
        }))
    }

    pub fn new_native_function(
        name: &str,
        call: impl Fn(&JsValue, &[JsValue]) -> JsResult<JsValue> + 'static,
    ) -> Self {
        Self::with_kind(ObjectKind::Function(FunctionData {
            name: name.to_string(),
            source: None,
            call: Rc::new(call),
        }))
    }

    pub fn new_error(name: &str, message: impl Into<String>) -> Self {
        Self::with_kind(ObjectKind::Error {
            name: name.to_string(),
            message: message.into(),
        })
    }

    pub fn new_regexp(source: &str, flags: &str) -> Self {
        Self::with_kind(ObjectKind::RegExp {
            source: source.to_string(),
            flags: flags.to_string(),
        })
    }

    pub fn new_date(time: f64, zone: TimeZone) -> Self {
        Self::with_kind(ObjectKind::Date {
            time: crate::date::time_clip(time),
            zone,
        })
    }

    /// Wrapper object for a primitive (`new Number(1)`, `Object('a')`)
    pub fn new_wrapper(primitive: JsValue) -> Self {
        Self::with_kind(ObjectKind::Primitive(primitive))
    }

    pub fn new_promise(state: PromiseState) -> Self {
        Self::with_kind(ObjectKind::Promise(state))
    }

    pub fn new_host(class: &str) -> Self {
        Self::with_kind(ObjectKind::Host {
            class: class.to_string(),
        })
    }

    pub fn borrow(&self) -> Ref<'_, JsObject> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, JsObject> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.borrow().prototype.clone()
    }

    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        self.borrow_mut().prototype = prototype;
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array { .. })
    }

    /// Constructor-style class name used by the normalizer and diagnostics
    pub fn class_name(&self) -> String {
        match &self.borrow().kind {
            ObjectKind::Ordinary => "Object".to_string(),
            ObjectKind::Array { .. } => "Array".to_string(),
            ObjectKind::Function(_) => "Function".to_string(),
            ObjectKind::Error { name, .. } => name.clone(),
            ObjectKind::RegExp { .. } => "RegExp".to_string(),
            ObjectKind::Date { .. } => "Date".to_string(),
            ObjectKind::Primitive(JsValue::Boolean(_)) => "Boolean".to_string(),
            ObjectKind::Primitive(JsValue::Number(_)) => "Number".to_string(),
            ObjectKind::Primitive(JsValue::String(_)) => "String".to_string(),
            ObjectKind::Primitive(JsValue::Symbol(_)) => "Symbol".to_string(),
            ObjectKind::Primitive(_) => "Object".to_string(),
            ObjectKind::Promise(_) => "Promise".to_string(),
            ObjectKind::Host { class } => class.clone(),
        }
    }

    /// Error name and message, preferring own `name`/`message` data properties
    pub fn error_parts(&self) -> Option<(String, String)> {
        let inner = self.borrow();
        let ObjectKind::Error { name, message } = &inner.kind else {
            return None;
        };
        let own_string = |key: &str| match inner.own_property(&key.into()) {
            Some(Property {
                slot: PropertySlot::Data {
                    value: JsValue::String(s),
                    ..
                },
                ..
            }) => Some(s),
            _ => None,
        };
        Some((
            own_string("name").unwrap_or_else(|| name.clone()),
            own_string("message").unwrap_or_else(|| message.clone()),
        ))
    }

    pub fn promise_state(&self) -> Option<PromiseState> {
        match &self.borrow().kind {
            ObjectKind::Promise(state) => Some(state.clone()),
            _ => None,
        }
    }

    pub fn set_promise_state(&self, state: PromiseState) {
        if let ObjectKind::Promise(slot) = &mut self.borrow_mut().kind {
            *slot = state;
        }
    }

    pub fn array_length(&self) -> Option<u32> {
        match self.borrow().kind {
            ObjectKind::Array { length, .. } => Some(length),
            _ => None,
        }
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<Property> {
        self.borrow().own_property(key)
    }

    /// `Object.getOwnPropertyDescriptor` read-back
    pub fn get_own_property_descriptor(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.get_own_property(key).map(|p| p.to_descriptor())
    }

    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.borrow().own_keys()
    }

    /// Own enumerable string keys, the order of `Object.keys`
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        let inner = self.borrow();
        inner
            .own_keys()
            .into_iter()
            .filter(|key| {
                !key.is_symbol() && inner.own_property(key).is_some_and(|p| p.enumerable)
            })
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect()
    }

    /// Keys visited by `for...in`: own then inherited enumerable string keys,
    /// shadowed names visited once
    pub fn for_in_keys(&self) -> Vec<String> {
        let mut visited: Vec<String> = Vec::new();
        let mut keys = Vec::new();
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            let inner = obj.borrow();
            for key in inner.own_keys() {
                let Some(name) = key.as_str() else { continue };
                if visited.iter().any(|v| v == name) {
                    continue;
                }
                visited.push(name.to_string());
                if inner.own_property(&key).is_some_and(|p| p.enumerable) {
                    keys.push(name.to_string());
                }
            }
            current = inner.prototype.clone();
        }
        keys
    }

    /// Values visited by `for...of` over an array: every index up to `length`,
    /// holes read through `[[Get]]` and therefore `undefined`
    pub fn array_values(&self) -> JsResult<Vec<JsValue>> {
        let length = self.array_length().unwrap_or(0);
        (0..length)
            .map(|index| self.get(&PropertyKey::from(index)))
            .collect()
    }

    fn find_property(&self, key: &PropertyKey) -> Option<Property> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Some(property) = obj.get_own_property(key) {
                return Some(property);
            }
            current = obj.prototype();
        }
        None
    }

    pub fn has_property(&self, key: &PropertyKey) -> bool {
        self.find_property(key).is_some()
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// `[[Get]]` with this object as receiver
    pub fn get(&self, key: &PropertyKey) -> JsResult<JsValue> {
        match self.find_property(key) {
            None => Ok(JsValue::Undefined),
            Some(Property {
                slot: PropertySlot::Data { value, .. },
                ..
            }) => Ok(value),
            Some(Property {
                slot: PropertySlot::Accessor { get, .. },
                ..
            }) => match get {
                JsValue::Object(getter) => getter.call(&JsValue::Object(self.clone()), &[]),
                _ => Ok(JsValue::Undefined),
            },
        }
    }

    /// `[[Set]]`; returns `Ok(false)` where strict code would throw
    pub fn set(&self, key: PropertyKey, value: JsValue) -> JsResult<bool> {
        if self.is_array() && key.as_str() == Some("length") {
            let length = array_length_from(&value)?;
            return Ok(self.set_array_length(length));
        }
        match self.find_property(&key) {
            Some(Property {
                slot: PropertySlot::Accessor { set, .. },
                ..
            }) => match set {
                JsValue::Object(setter) => {
                    setter.call(&JsValue::Object(self.clone()), &[value])?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            Some(Property {
                slot: PropertySlot::Data {
                    writable: false, ..
                },
                ..
            }) => Ok(false),
            _ => {
                let mut inner = self.borrow_mut();
                match inner.own_property(&key) {
                    Some(mut property) => {
                        property.slot = PropertySlot::Data {
                            value,
                            writable: true,
                        };
                        inner.insert(key, property);
                        Ok(true)
                    }
                    None if inner.extensible && !inner.grows_fixed_length(&key) => {
                        inner.insert(key, Property::data(value));
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }

    /// ArraySetLength; `false` when the length is read-only or an element
    /// at or above `new_length` could not be deleted
    fn set_array_length(&self, new_length: u32) -> bool {
        let mut inner = self.borrow_mut();
        let ObjectKind::Array {
            length,
            length_writable,
        } = inner.kind
        else {
            return false;
        };
        if !length_writable {
            return new_length == length;
        }
        // Deletion runs downward and halts at the highest non-configurable element
        let final_length = inner
            .properties
            .iter()
            .filter_map(|(k, p)| k.array_index().filter(|&i| i >= new_length && !p.configurable))
            .max()
            .map_or(new_length, |index| index + 1);
        inner
            .properties
            .retain(|(k, _)| k.array_index().is_none_or(|index| index < final_length));
        if let ObjectKind::Array { length, .. } = &mut inner.kind {
            *length = final_length;
        }
        final_length == new_length
    }

    fn set_length_writable(&self, writable: bool) {
        if let ObjectKind::Array {
            length_writable, ..
        } = &mut self.borrow_mut().kind
        {
            *length_writable = writable;
        }
    }

    /// `[[DefineOwnProperty]]` in the throwing form used by `Object.defineProperty`
    pub fn define_own_property(&self, key: PropertyKey, desc: PropertyDescriptor) -> JsResult<()> {
        if self.is_array() && key.as_str() == Some("length") {
            let redefine = || Thrown::type_error("Cannot redefine property: length");
            let writable = self
                .get_own_property(&key)
                .is_some_and(|p| matches!(p.slot, PropertySlot::Data { writable: true, .. }));
            if desc.is_accessor()
                || desc.configurable == Some(true)
                || desc.enumerable == Some(true)
                || (desc.writable == Some(true) && !writable)
            {
                return Err(redefine());
            }
            if let Some(value) = &desc.value {
                let length = array_length_from(value)?;
                if !self.set_array_length(length) {
                    return Err(redefine());
                }
            }
            if desc.writable == Some(false) {
                self.set_length_writable(false);
            }
            return Ok(());
        }

        let mut inner = self.borrow_mut();
        let Some(current) = inner.own_property(&key) else {
            if !inner.extensible || inner.grows_fixed_length(&key) {
                return Err(Thrown::type_error(format!(
                    "Cannot define property {key}, object is not extensible"
                )));
            }
            let slot = if desc.is_accessor() {
                PropertySlot::Accessor {
                    get: desc.get.unwrap_or_default(),
                    set: desc.set.unwrap_or_default(),
                }
            } else {
                PropertySlot::Data {
                    value: desc.value.unwrap_or_default(),
                    writable: desc.writable.unwrap_or(false),
                }
            };
            inner.insert(
                key,
                Property {
                    slot,
                    enumerable: desc.enumerable.unwrap_or(false),
                    configurable: desc.configurable.unwrap_or(false),
                },
            );
            return Ok(());
        };

        let redefine = || Thrown::type_error(format!("Cannot redefine property: {key}"));
        if !current.configurable {
            if desc.configurable == Some(true) {
                return Err(redefine());
            }
            if desc.enumerable.is_some_and(|e| e != current.enumerable) {
                return Err(redefine());
            }
            match &current.slot {
                PropertySlot::Data { .. } if desc.is_accessor() => return Err(redefine()),
                PropertySlot::Accessor { .. } if desc.is_data() => return Err(redefine()),
                PropertySlot::Data {
                    value,
                    writable: false,
                } => {
                    if desc.writable == Some(true) {
                        return Err(redefine());
                    }
                    if desc
                        .value
                        .as_ref()
                        .is_some_and(|v| !crate::convert::same_value(v, value))
                    {
                        return Err(redefine());
                    }
                }
                PropertySlot::Accessor { get, set } => {
                    let changed = |new: &Option<JsValue>, old: &JsValue| {
                        new.as_ref()
                            .is_some_and(|v| !crate::convert::same_value(v, old))
                    };
                    if changed(&desc.get, get) || changed(&desc.set, set) {
                        return Err(redefine());
                    }
                }
                PropertySlot::Data { .. } => {}
            }
        }

        let slot = match current.slot {
            PropertySlot::Data { value, writable } if !desc.is_accessor() => PropertySlot::Data {
                value: desc.value.unwrap_or(value),
                writable: desc.writable.unwrap_or(writable),
            },
            PropertySlot::Accessor { get, set } if !desc.is_data() => PropertySlot::Accessor {
                get: desc.get.unwrap_or(get),
                set: desc.set.unwrap_or(set),
            },
            PropertySlot::Data { .. } => PropertySlot::Accessor {
                get: desc.get.unwrap_or_default(),
                set: desc.set.unwrap_or_default(),
            },
            PropertySlot::Accessor { .. } => PropertySlot::Data {
                value: desc.value.unwrap_or_default(),
                writable: desc.writable.unwrap_or(false),
            },
        };
        inner.insert(
            key,
            Property {
                slot,
                enumerable: desc.enumerable.unwrap_or(current.enumerable),
                configurable: desc.configurable.unwrap_or(current.configurable),
            },
        );
        Ok(())
    }

    /// `delete obj[key]`; `false` when the property is non-configurable
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut inner = self.borrow_mut();
        match inner.own_property(key) {
            Some(property) if !property.configurable => false,
            Some(_) => {
                inner.remove(key);
                true
            }
            None => true,
        }
    }

    pub fn prevent_extensions(&self) {
        self.borrow_mut().extensible = false;
    }

    pub fn is_extensible(&self) -> bool {
        self.borrow().extensible
    }

    /// `Object.freeze`
    pub fn freeze(&self) {
        self.restrict(true);
    }

    /// `Object.seal`
    pub fn seal(&self) {
        self.restrict(false);
    }

    fn restrict(&self, freeze: bool) {
        let mut inner = self.borrow_mut();
        inner.extensible = false;
        if let (true, ObjectKind::Array { length_writable, .. }) = (freeze, &mut inner.kind) {
            *length_writable = false;
        }
        for (_, property) in inner.properties.iter_mut() {
            property.configurable = false;
            if let (true, PropertySlot::Data { writable, .. }) = (freeze, &mut property.slot) {
                *writable = false;
            }
        }
    }

    /// `Object.isFrozen`
    pub fn is_frozen(&self) -> bool {
        let inner = self.borrow();
        !inner.extensible
            && !matches!(
                inner.kind,
                ObjectKind::Array {
                    length_writable: true,
                    ..
                }
            )
            && inner.properties.iter().all(|(_, p)| {
                !p.configurable
                    && !matches!(p.slot, PropertySlot::Data { writable: true, .. })
            })
    }

    /// `Object.isSealed`
    pub fn is_sealed(&self) -> bool {
        let inner = self.borrow();
        !inner.extensible && inner.properties.iter().all(|(_, p)| !p.configurable)
    }

    /// `[[Call]]`
    pub fn call(&self, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
        let call = match &self.borrow().kind {
            ObjectKind::Function(data) => data.call.clone(),
            _ => {
                return Err(Thrown::type_error(format!(
                    "{} is not a function",
                    crate::format::render_nested(&JsValue::Object(self.clone()))
                )));
            }
        };
        call(this, args)
    }
}

fn array_length_from(value: &JsValue) -> JsResult<u32> {
    let number = crate::convert::to_number(value)?;
    let length = crate::convert::to_uint32(number);
    if length as f64 != number {
        return Err(Thrown::range_error("Invalid array length"));
    }
    Ok(length)
}
