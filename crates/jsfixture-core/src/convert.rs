//! Abstract type conversions
//!
//! `ToPrimitive` is dispatched over a closed set of object kinds. User hooks
//! (`valueOf` / `toString` found on the object or its prototype chain) always
//! win; when the chain has no such method the built-in behavior for the
//! object's kind is used instead, so objects created without a realm still
//! coerce the way the corresponding built-in would.

use std::cell::RefCell;

use crate::error::{JsResult, Thrown};
use crate::value::{JsValue, ObjectKind, ObjectRef, PropertyKey};

/// Hint passed to `ToPrimitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// No hint, as used by `+` and `==`
    Default,
    Number,
    String,
}

thread_local! {
    /// Arrays currently being joined, so cyclic arrays join as ""
    static JOIN_STACK: RefCell<Vec<ObjectRef>> = const { RefCell::new(Vec::new()) };
}

/// ToPrimitive
pub fn to_primitive(value: &JsValue, hint: PreferredType) -> JsResult<JsValue> {
    let JsValue::Object(obj) = value else {
        return Ok(value.clone());
    };

    let is_date = matches!(obj.borrow().kind, ObjectKind::Date { .. });
    let methods = match hint {
        PreferredType::String => ["toString", "valueOf"],
        PreferredType::Default if is_date => ["toString", "valueOf"],
        PreferredType::Default | PreferredType::Number => ["valueOf", "toString"],
    };

    for name in methods {
        let key = PropertyKey::from(name);
        if obj.has_property(&key) {
            if let JsValue::Object(method) = obj.get(&key)? {
                if method.is_callable() {
                    let result = method.call(value, &[])?;
                    if !result.is_object() {
                        return Ok(result);
                    }
                }
            }
        } else if obj.borrow().inherits_builtins {
            let builtin = match name {
                "valueOf" => builtin_value_of(obj),
                _ => Some(builtin_to_string(obj)?),
            };
            if let Some(result) = builtin {
                tracing::trace!(method = name, "builtin conversion");
                return Ok(result);
            }
        }
    }

    Err(Thrown::type_error("Cannot convert object to primitive value"))
}

/// Built-in `valueOf`; `None` when it would return the object itself
fn builtin_value_of(obj: &ObjectRef) -> Option<JsValue> {
    match &obj.borrow().kind {
        ObjectKind::Primitive(primitive) => Some(primitive.clone()),
        ObjectKind::Date { time, .. } => Some(JsValue::Number(*time)),
        _ => None,
    }
}

/// Built-in `toString` for the object's kind
pub fn builtin_to_string(obj: &ObjectRef) -> JsResult<JsValue> {
    let kind = obj.borrow().kind.clone();
    let text = match kind {
        ObjectKind::Ordinary => "[object Object]".to_string(),
        ObjectKind::Array { .. } => return join_array(obj, ",").map(JsValue::String),
        ObjectKind::Function(data) => data.source_text(),
        ObjectKind::Error { .. } => match obj.error_parts() {
            Some((name, message)) if message.is_empty() => name,
            Some((name, message)) if name.is_empty() => message,
            Some((name, message)) => format!("{name}: {message}"),
            None => "Error".to_string(),
        },
        ObjectKind::RegExp { source, flags } => format!("/{source}/{flags}"),
        ObjectKind::Date { time, zone } => crate::date::to_date_string(time, &zone),
        ObjectKind::Primitive(JsValue::Symbol(sym)) => sym.descriptive_string(),
        ObjectKind::Primitive(primitive) => to_string(&primitive)?,
        ObjectKind::Promise(_) => "[object Promise]".to_string(),
        ObjectKind::Host { class } => format!("[object {class}]"),
    };
    Ok(JsValue::String(text))
}

/// `Array.prototype.join`: holes, `undefined` and `null` join as empty strings
pub fn join_array(array: &ObjectRef, separator: &str) -> JsResult<String> {
    let cyclic = JOIN_STACK.with(|stack| stack.borrow().iter().any(|a| a.ptr_eq(array)));
    if cyclic {
        return Ok(String::new());
    }

    JOIN_STACK.with(|stack| stack.borrow_mut().push(array.clone()));
    let result = join_elements(array, separator);
    JOIN_STACK.with(|stack| stack.borrow_mut().pop());
    result
}

fn join_elements(array: &ObjectRef, separator: &str) -> JsResult<String> {
    let length = array.array_length().unwrap_or(0);
    let mut parts = Vec::with_capacity(length as usize);
    for index in 0..length {
        let element = array.get(&PropertyKey::from(index))?;
        parts.push(if element.is_nullish() {
            String::new()
        } else {
            to_string(&element)?
        });
    }
    Ok(parts.join(separator))
}

/// ToBoolean
pub fn to_boolean(value: &JsValue) -> bool {
    match value {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => !(*n == 0.0 || n.is_nan()),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Symbol(_) | JsValue::Object(_) => true,
    }
}

/// ToNumber
pub fn to_number(value: &JsValue) -> JsResult<f64> {
    match value {
        JsValue::Undefined => Ok(f64::NAN),
        JsValue::Null => Ok(0.0),
        JsValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        JsValue::Number(n) => Ok(*n),
        JsValue::String(s) => Ok(string_to_number(s)),
        JsValue::Symbol(_) => Err(Thrown::type_error(
            "Cannot convert a Symbol value to a number",
        )),
        JsValue::Object(_) => to_number(&to_primitive(value, PreferredType::Number)?),
    }
}

fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' ' | '\u{A0}' | '\u{FEFF}' | '\u{2028}'
            | '\u{2029}'
    ) || (c.is_whitespace() && c != '\u{85}')
}

/// StringToNumber
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            let mut acc = 0.0;
            for c in digits.chars() {
                match c.to_digit(radix) {
                    Some(d) => acc = acc * radix as f64 + d as f64,
                    None => return f64::NAN,
                }
            }
            return acc;
        }
    }

    let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    if unsigned == "Infinity" {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    // Rust accepts "inf" and "nan" spellings that JavaScript does not
    let valid = unsigned.bytes().any(|b| b.is_ascii_digit())
        && unsigned
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToString
pub fn to_string(value: &JsValue) -> JsResult<String> {
    match value {
        JsValue::Undefined => Ok("undefined".to_string()),
        JsValue::Null => Ok("null".to_string()),
        JsValue::Boolean(b) => Ok(b.to_string()),
        JsValue::Number(n) => Ok(crate::number::number_to_string(*n)),
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Symbol(_) => Err(Thrown::type_error(
            "Cannot convert a Symbol value to a string",
        )),
        JsValue::Object(_) => to_string(&to_primitive(value, PreferredType::String)?),
    }
}

/// ToPropertyKey
pub fn to_property_key(value: &JsValue) -> JsResult<PropertyKey> {
    match to_primitive(value, PreferredType::String)? {
        JsValue::Symbol(sym) => Ok(PropertyKey::Symbol(sym)),
        other => Ok(PropertyKey::String(to_string(&other)?)),
    }
}

/// ToObject; primitives are boxed into wrapper objects
pub fn to_object(value: &JsValue) -> JsResult<ObjectRef> {
    match value {
        JsValue::Undefined | JsValue::Null => Err(Thrown::type_error(
            "Cannot convert undefined or null to object",
        )),
        JsValue::Object(obj) => Ok(obj.clone()),
        primitive => Ok(ObjectRef::new_wrapper(primitive.clone())),
    }
}

/// ToIntegerOrInfinity on an already converted number
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        // `+ 0.0` folds -0 into +0
        n.trunc() + 0.0
    }
}

/// ToUint32 on an already converted number
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let int = n.trunc();
    int.rem_euclid(4_294_967_296.0) as u32
}

/// ToInt32 on an already converted number
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// SameValue, the comparison behind `Object.is`
pub fn same_value(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) => {
            if x.is_nan() && y.is_nan() {
                true
            } else {
                x == y && x.is_sign_negative() == y.is_sign_negative()
            }
        }
        _ => crate::ops::strict_equals(a, b),
    }
}

/// SameValueZero, as used by `includes` and `Map` keys
pub fn same_value_zero(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
        _ => crate::ops::strict_equals(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Symbol, PropertyDescriptor};
    use std::rc::Rc;

    fn object_with_method(name: &str, result: JsValue) -> ObjectRef {
        let obj = ObjectRef::new_ordinary();
        let method = ObjectRef::new_native_function(name, move |_, _| Ok(result.clone()));
        obj.set(name.into(), method.into()).unwrap();
        obj
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  \n "), 0.0);
        assert_eq!(string_to_number("1"), 1.0);
        assert_eq!(string_to_number(" 3.0 "), 3.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(string_to_number(".5"), 0.5);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("NaN").is_nan());
        assert!(string_to_number("1a").is_nan());
        assert!(string_to_number("0x").is_nan());
        assert!(string_to_number("-0x10").is_nan());
    }

    #[test]
    fn test_to_number_symbol_throws() {
        let err = to_number(&JsValue::Symbol(Symbol::new(None))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot convert a Symbol value to a number"
        );
    }

    #[test]
    fn test_value_of_preferred_for_number_hint() {
        let obj = object_with_method("valueOf", JsValue::from(42));
        obj.set(
            "toString".into(),
            ObjectRef::new_native_function("toString", |_, _| Ok("str".into())).into(),
        )
        .unwrap();
        let value = JsValue::Object(obj);

        assert_eq!(to_number(&value).unwrap(), 42.0);
        assert_eq!(to_string(&value).unwrap(), "str");
        assert_eq!(
            to_primitive(&value, PreferredType::Default)
                .unwrap()
                .as_number(),
            Some(42.0)
        );
    }

    #[test]
    fn test_to_string_hook_returning_object_falls_through() {
        let obj = object_with_method("toString", JsValue::Object(ObjectRef::new_ordinary()));
        let value = JsValue::Object(obj);
        // valueOf is the builtin (returns the object), toString returns an object
        let err = to_primitive(&value, PreferredType::Default).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot convert object to primitive value"
        );
    }

    #[test]
    fn test_null_prototype_object_has_no_primitive() {
        let obj = ObjectRef::create(None);
        let err = to_string(&JsValue::Object(obj)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot convert object to primitive value"
        );
    }

    #[test]
    fn test_builtin_to_string_by_kind() {
        let plain = JsValue::Object(ObjectRef::new_ordinary());
        assert_eq!(to_string(&plain).unwrap(), "[object Object]");

        let arr = ObjectRef::new_array(vec![
            Some(1.into()),
            None,
            Some(JsValue::Null),
            Some("x".into()),
        ]);
        assert_eq!(to_string(&arr.into()).unwrap(), "1,,,x");

        let re = ObjectRef::new_regexp("a", "g");
        assert_eq!(to_string(&re.into()).unwrap(), "/a/g");

        let err = ObjectRef::new_error("TypeError", "bad");
        assert_eq!(to_string(&err.into()).unwrap(), "TypeError: bad");

        let boxed = ObjectRef::new_wrapper(JsValue::from(3.5));
        assert_eq!(to_number(&boxed.into()).unwrap(), 3.5);
    }

    #[test]
    fn test_cyclic_array_join() {
        let arr = ObjectRef::array_from([JsValue::from(1)]);
        arr.set("1".into(), arr.clone().into()).unwrap();
        assert_eq!(to_string(&arr.into()).unwrap(), "1,");
    }

    #[test]
    fn test_int32_wrapping() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(f64::INFINITY), 0);
        assert_eq!(to_int32(-3.7), -3);
    }

    #[test]
    fn test_same_value_distinguishes_zero() {
        assert!(!same_value(&JsValue::from(0.0), &JsValue::from(-0.0)));
        assert!(same_value(&JsValue::from(f64::NAN), &JsValue::from(f64::NAN)));
        assert!(same_value_zero(&JsValue::from(0.0), &JsValue::from(-0.0)));
    }

    #[test]
    fn test_getter_hook_is_called_through_get() {
        let obj = ObjectRef::new_ordinary();
        let calls = Rc::new(std::cell::Cell::new(0));
        let counter = calls.clone();
        let getter = ObjectRef::new_native_function("get", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(ObjectRef::new_native_function("valueOf", |_, _| Ok(JsValue::from(9))).into())
        });
        obj.define_own_property(
            "valueOf".into(),
            PropertyDescriptor {
                get: Some(getter.into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(to_number(&obj.into()).unwrap(), 9.0);
        assert_eq!(calls.get(), 1);
    }
}
