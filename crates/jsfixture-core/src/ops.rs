//! Operator semantics
//!
//! Binary and unary operators over `JsValue`, built on the conversions in
//! [`crate::convert`]. Evaluation order of operand conversions follows the
//! language: left operand first.

use std::fmt;

use crate::convert::{PreferredType, to_int32, to_number, to_primitive, to_string, to_uint32};
use crate::error::JsResult;
use crate::value::JsValue;

/// Binary operators with value semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Lt,
    Gt,
    Le,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Exp => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::LooseEq => "==",
            BinaryOp::LooseNe => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
        }
    }

    pub fn apply(self, left: &JsValue, right: &JsValue) -> JsResult<JsValue> {
        match self {
            BinaryOp::Add => add(left, right),
            BinaryOp::Sub => numeric(left, right, |a, b| a - b),
            BinaryOp::Mul => numeric(left, right, |a, b| a * b),
            BinaryOp::Div => numeric(left, right, |a, b| a / b),
            // f64 `%` is C fmod, which matches the language's remainder
            BinaryOp::Rem => numeric(left, right, |a, b| a % b),
            BinaryOp::Exp => numeric(left, right, exponentiate),
            BinaryOp::BitAnd => int32(left, right, |a, b| a & b),
            BinaryOp::BitOr => int32(left, right, |a, b| a | b),
            BinaryOp::BitXor => int32(left, right, |a, b| a ^ b),
            BinaryOp::Shl => {
                let (a, b) = numbers(left, right)?;
                Ok(JsValue::from(to_int32(a).wrapping_shl(to_uint32(b) & 31)))
            }
            BinaryOp::Shr => {
                let (a, b) = numbers(left, right)?;
                Ok(JsValue::from(to_int32(a) >> (to_uint32(b) & 31)))
            }
            BinaryOp::UShr => {
                let (a, b) = numbers(left, right)?;
                Ok(JsValue::from(to_uint32(a) >> (to_uint32(b) & 31)))
            }
            BinaryOp::Lt => Ok(less_than(left, right, true)?.unwrap_or(false).into()),
            BinaryOp::Gt => Ok(less_than(right, left, false)?.unwrap_or(false).into()),
            BinaryOp::Le => Ok(less_than(right, left, false)?.is_some_and(|r| !r).into()),
            BinaryOp::Ge => Ok(less_than(left, right, true)?.is_some_and(|r| !r).into()),
            BinaryOp::LooseEq => Ok(loose_equals(left, right)?.into()),
            BinaryOp::LooseNe => Ok((!loose_equals(left, right)?).into()),
            BinaryOp::StrictEq => Ok(strict_equals(left, right).into()),
            BinaryOp::StrictNe => Ok((!strict_equals(left, right)).into()),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn numbers(left: &JsValue, right: &JsValue) -> JsResult<(f64, f64)> {
    let a = to_number(left)?;
    let b = to_number(right)?;
    Ok((a, b))
}

fn numeric(left: &JsValue, right: &JsValue, op: impl Fn(f64, f64) -> f64) -> JsResult<JsValue> {
    let (a, b) = numbers(left, right)?;
    Ok(JsValue::Number(op(a, b)))
}

fn int32(left: &JsValue, right: &JsValue, op: impl Fn(i32, i32) -> i32) -> JsResult<JsValue> {
    let (a, b) = numbers(left, right)?;
    Ok(JsValue::from(op(to_int32(a), to_int32(b))))
}

/// The `+` operator: string concatenation if either primitive is a string
pub fn add(left: &JsValue, right: &JsValue) -> JsResult<JsValue> {
    let lprim = to_primitive(left, PreferredType::Default)?;
    let rprim = to_primitive(right, PreferredType::Default)?;
    if matches!(lprim, JsValue::String(_)) || matches!(rprim, JsValue::String(_)) {
        let mut text = to_string(&lprim)?;
        text.push_str(&to_string(&rprim)?);
        return Ok(JsValue::String(text));
    }
    let (a, b) = numbers(&lprim, &rprim)?;
    Ok(JsValue::Number(a + b))
}

/// Number::exponentiate; differs from `powf` for NaN exponents and `±1 ** ±Infinity`
pub fn exponentiate(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() {
        return f64::NAN;
    }
    if exponent == 0.0 {
        return 1.0;
    }
    if base.abs() == 1.0 && exponent.is_infinite() {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// IsLessThan. `None` means undefined (a NaN was involved).
pub fn less_than(x: &JsValue, y: &JsValue, left_first: bool) -> JsResult<Option<bool>> {
    let (px, py) = if left_first {
        let px = to_primitive(x, PreferredType::Number)?;
        let py = to_primitive(y, PreferredType::Number)?;
        (px, py)
    } else {
        let py = to_primitive(y, PreferredType::Number)?;
        let px = to_primitive(x, PreferredType::Number)?;
        (px, py)
    };

    if let (JsValue::String(a), JsValue::String(b)) = (&px, &py) {
        return Ok(Some(a.encode_utf16().lt(b.encode_utf16())));
    }

    let (nx, ny) = if left_first {
        numbers(&px, &py)?
    } else {
        let ny = to_number(&py)?;
        (to_number(&px)?, ny)
    };
    if nx.is_nan() || ny.is_nan() {
        return Ok(None);
    }
    Ok(Some(nx < ny))
}

/// IsStrictlyEqual (`===`)
pub fn strict_equals(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(x), JsValue::Boolean(y)) => x == y,
        (JsValue::Number(x), JsValue::Number(y)) => x == y,
        (JsValue::String(x), JsValue::String(y)) => x == y,
        (JsValue::Symbol(x), JsValue::Symbol(y)) => x.ptr_eq(y),
        (JsValue::Object(x), JsValue::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// IsLooselyEqual (`==`)
pub fn loose_equals(a: &JsValue, b: &JsValue) -> JsResult<bool> {
    match (a, b) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => Ok(true),
        (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => {
            Ok(false)
        }
        (JsValue::Number(x), JsValue::String(_)) => Ok(*x == to_number(b)?),
        (JsValue::String(_), JsValue::Number(y)) => Ok(to_number(a)? == *y),
        (JsValue::Boolean(_), _) => loose_equals(&JsValue::Number(to_number(a)?), b),
        (_, JsValue::Boolean(_)) => loose_equals(a, &JsValue::Number(to_number(b)?)),
        (JsValue::Object(_), JsValue::Object(_)) => Ok(strict_equals(a, b)),
        (JsValue::Object(_), _) => loose_equals(&to_primitive(a, PreferredType::Default)?, b),
        (_, JsValue::Object(_)) => loose_equals(a, &to_primitive(b, PreferredType::Default)?),
        _ => Ok(strict_equals(a, b)),
    }
}

/// Unary `-`
pub fn negate(value: &JsValue) -> JsResult<JsValue> {
    Ok(JsValue::Number(-to_number(value)?))
}

/// Unary `+`
pub fn unary_plus(value: &JsValue) -> JsResult<JsValue> {
    Ok(JsValue::Number(to_number(value)?))
}

/// Unary `~`
pub fn bit_not(value: &JsValue) -> JsResult<JsValue> {
    Ok(JsValue::from(!to_int32(to_number(value)?)))
}

/// Unary `!`
pub fn logical_not(value: &JsValue) -> JsValue {
    JsValue::Boolean(!crate::convert::to_boolean(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::render_value;
    use crate::value::{ObjectRef, Symbol};

    fn show(result: JsResult<JsValue>) -> String {
        match result {
            Ok(value) => render_value(&value).text,
            Err(thrown) => thrown.to_string(),
        }
    }

    #[test]
    fn test_add_with_undefined_left() {
        let p = JsValue::Undefined;
        let cases: Vec<(JsValue, &str)> = vec![
            (JsValue::Undefined, "NaN"),
            (JsValue::Null, "NaN"),
            (JsValue::from(1), "NaN"),
            (JsValue::from(true), "NaN"),
            (JsValue::from(""), "undefined"),
            (JsValue::from("1"), "undefined1"),
            (
                ObjectRef::new_regexp("a", "").into(),
                "undefined/a/",
            ),
            (
                ObjectRef::new_function("g", "function g() { }", |_, _| Ok(JsValue::Undefined))
                    .into(),
                "undefinedfunction g() { }",
            ),
            (
                JsValue::Symbol(Symbol::new(None)),
                "TypeError: Cannot convert a Symbol value to a number",
            ),
        ];
        for (right, expected) in cases {
            assert_eq!(show(add(&p, &right)), expected, "undefined + {right:?}");
        }
    }

    #[test]
    fn test_add_string_with_symbol() {
        let result = add(&JsValue::from(""), &JsValue::Symbol(Symbol::new(Some("a"))));
        assert_eq!(
            show(result),
            "TypeError: Cannot convert a Symbol value to a string"
        );
    }

    #[test]
    fn test_add_uses_value_of_hook() {
        let obj = ObjectRef::new_ordinary();
        obj.set(
            "toString".into(),
            ObjectRef::new_native_function("toString", |_, _| Ok(JsValue::from(1))).into(),
        )
        .unwrap();
        assert_eq!(show(add(&JsValue::Null, &obj.into())), "1");

        let obj = ObjectRef::new_ordinary();
        obj.set(
            "toString".into(),
            ObjectRef::new_native_function("toString", |_, _| Ok(JsValue::from("3.0"))).into(),
        )
        .unwrap();
        assert_eq!(show(add(&JsValue::Undefined, &obj.into())), "undefined3.0");
    }

    #[test]
    fn test_numeric_operators() {
        let one = JsValue::from(1);
        assert_eq!(show(BinaryOp::Mul.apply(&one, &JsValue::from("2"))), "2");
        assert_eq!(show(BinaryOp::Div.apply(&one, &JsValue::from(0))), "Infinity");
        assert_eq!(show(BinaryOp::Div.apply(&one, &JsValue::from(-0.0))), "-Infinity");
        assert_eq!(show(BinaryOp::Rem.apply(&JsValue::from(-5), &JsValue::from(3))), "-2");
        assert_eq!(show(BinaryOp::Exp.apply(&one, &JsValue::from(f64::INFINITY))), "NaN");
        assert_eq!(show(BinaryOp::Exp.apply(&one, &JsValue::Undefined)), "NaN");
        assert_eq!(show(BinaryOp::Exp.apply(&JsValue::from(2), &JsValue::from(10))), "1024");
        assert_eq!(show(BinaryOp::Exp.apply(&JsValue::from(f64::NAN), &JsValue::from(0))), "1");
    }

    #[test]
    fn test_bitwise_operators() {
        let one = JsValue::from(1);
        assert_eq!(show(BinaryOp::BitAnd.apply(&one, &JsValue::from(true))), "1");
        assert_eq!(show(BinaryOp::BitXor.apply(&one, &JsValue::from("1"))), "0");
        assert_eq!(show(BinaryOp::BitXor.apply(&one, &JsValue::from(f64::NAN))), "1");
        assert_eq!(show(BinaryOp::Shr.apply(&JsValue::from(-8), &one)), "-4");
        assert_eq!(show(BinaryOp::UShr.apply(&JsValue::from(-1), &JsValue::from(0))), "4294967295");
        assert_eq!(show(BinaryOp::Shl.apply(&one, &JsValue::from(33))), "2");
        assert_eq!(show(bit_not(&JsValue::from(-1))), "0");
        assert_eq!(
            show(BinaryOp::Shr.apply(&one, &JsValue::Symbol(Symbol::new(None)))),
            "TypeError: Cannot convert a Symbol value to a number"
        );
    }

    #[test]
    fn test_relational_operators() {
        let lt = |a: JsValue, b: JsValue| show(BinaryOp::Lt.apply(&a, &b));
        assert_eq!(lt("a".into(), "b".into()), "true");
        assert_eq!(lt("10".into(), "9".into()), "true");
        assert_eq!(lt(10.into(), "9".into()), "false");
        assert_eq!(lt(JsValue::Undefined, 1.into()), "false");
        assert_eq!(show(BinaryOp::Ge.apply(&JsValue::Undefined, &1.into())), "false");
        assert_eq!(show(BinaryOp::Le.apply(&JsValue::Null, &0.into())), "true");
    }

    #[test]
    fn test_equality() {
        let eq = |a: JsValue, b: JsValue| loose_equals(&a, &b).unwrap();
        assert!(eq(JsValue::Null, JsValue::Undefined));
        assert!(!eq(JsValue::Null, 0.into()));
        assert!(eq("1".into(), 1.into()));
        assert!(eq(true.into(), "1".into()));
        assert!(!eq(f64::NAN.into(), f64::NAN.into()));
        let arr = ObjectRef::array_from([JsValue::from(1)]);
        assert!(eq(arr.clone().into(), "1".into()));
        assert!(eq(arr.clone().into(), arr.clone().into()));
        assert!(!eq(arr.into(), ObjectRef::array_from([JsValue::from(1)]).into()));

        assert!(strict_equals(&0.0.into(), &(-0.0).into()));
        assert!(!strict_equals(&"1".into(), &1.into()));
        let sym = Symbol::new(Some("s"));
        assert!(strict_equals(&sym.clone().into(), &sym.into()));
        assert!(!strict_equals(
            &Symbol::new(Some("s")).into(),
            &Symbol::new(Some("s")).into()
        ));
    }
}
