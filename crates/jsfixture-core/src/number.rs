//! Number-to-string conversions
//!
//! `Number::toString` uses the shortest round-tripping digits, which Rust's
//! `{:e}` formatting already produces. The fixed-precision methods work on
//! the exact decimal expansion of the magnitude and round ties upward, so
//! `(2.5).toFixed(0)` is `"3"` and `(-2.5).toFixed(0)` is `"-3"`.

use crate::convert::to_integer_or_infinity;
use crate::error::{JsResult, Thrown};

/// Decimal digits `d1 d2 ... dn` with value `0.d1d2...dn * 10^point`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Decimal {
    digits: Vec<u8>,
    point: i32,
}

impl Decimal {
    /// Exact expansion of a finite, non-negative double
    fn exact(x: f64) -> Self {
        // 1100 fractional digits cover the 1074 a subnormal can need
        let text = format!("{x:.1100}");
        let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
        let mut digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();
        let mut point = int_part.len() as i32;

        let leading = digits.iter().take_while(|&&d| d == 0).count();
        if leading == digits.len() {
            return Self {
                digits: Vec::new(),
                point: 0,
            };
        }
        digits.drain(..leading);
        point -= leading as i32;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        Self { digits, point }
    }

    /// Shortest round-tripping digits of a finite, positive double
    fn shortest(x: f64) -> Self {
        let text = format!("{x:e}");
        let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let digits: Vec<u8> = mantissa
            .bytes()
            .filter(u8::is_ascii_digit)
            .map(|b| b - b'0')
            .collect();
        let exponent: i32 = exponent.parse().unwrap_or(0);
        Self {
            digits,
            point: exponent + 1,
        }
    }

    fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Keep `count` leading digits, rounding half up. The result always has
    /// exactly `count` digits (zero padded) unless `count <= 0`.
    fn round_to(&self, count: i32) -> Decimal {
        if count < 0 {
            return Decimal {
                digits: Vec::new(),
                point: self.point,
            };
        }
        let count = count as usize;
        let mut digits: Vec<u8> = self.digits.iter().copied().take(count).collect();
        digits.resize(count, 0);
        let mut point = self.point;

        if self.digits.get(count).is_some_and(|&d| d >= 5) {
            let mut index = count;
            loop {
                if index == 0 {
                    digits.insert(0, 1);
                    digits.truncate(count.max(1));
                    point += 1;
                    break;
                }
                index -= 1;
                if digits[index] == 9 {
                    digits[index] = 0;
                } else {
                    digits[index] += 1;
                    break;
                }
            }
        }
        Decimal { digits, point }
    }

    fn digit_string(&self) -> String {
        self.digits.iter().map(|d| (b'0' + d) as char).collect()
    }
}

fn exponent_suffix(e: i32) -> String {
    if e >= 0 {
        format!("e+{e}")
    } else {
        format!("e-{}", -e)
    }
}

/// Number::toString(x) for radix 10
pub fn number_to_string(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if x < 0.0 {
        return format!("-{}", number_to_string(-x));
    }

    let decimal = Decimal::shortest(x);
    let digits = decimal.digit_string();
    let k = digits.len() as i32;
    let n = decimal.point;

    if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{int_part}.{frac_part}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let suffix = exponent_suffix(n - 1);
        if k == 1 {
            format!("{digits}{suffix}")
        } else {
            let (first, rest) = digits.split_at(1);
            format!("{first}.{rest}{suffix}")
        }
    }
}

/// `Number.prototype.toFixed`
///
/// `fraction_digits` is the already converted argument (`undefined` as 0).
pub fn to_fixed(x: f64, fraction_digits: f64) -> JsResult<String> {
    let f = to_integer_or_infinity(fraction_digits);
    if !(0.0..=100.0).contains(&f) {
        return Err(Thrown::range_error(
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    if x.is_nan() {
        return Ok("NaN".to_string());
    }
    if x.abs() >= 1e21 || x.is_infinite() {
        return Ok(number_to_string(x));
    }
    let f = f as usize;
    let sign = if x < 0.0 { "-" } else { "" };

    let exact = Decimal::exact(x.abs());
    let rounded = exact.round_to(exact.point + f as i32);
    Ok(format!("{sign}{}", fixed_notation(&rounded, f)))
}

/// Render with exactly `f` fractional digits
fn fixed_notation(decimal: &Decimal, f: usize) -> String {
    let (int_part, mut frac_part) = if decimal.is_zero() {
        ("0".to_string(), String::new())
    } else {
        let digits = decimal.digit_string();
        let point = decimal.point;
        if point <= 0 {
            ("0".to_string(), format!("{}{digits}", "0".repeat((-point) as usize)))
        } else if point as usize >= digits.len() {
            let zeros = "0".repeat(point as usize - digits.len());
            (format!("{digits}{zeros}"), String::new())
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            (int_part.to_string(), frac_part.to_string())
        }
    };
    frac_part.truncate(f);
    while frac_part.len() < f {
        frac_part.push('0');
    }
    if f == 0 {
        int_part
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// `Number.prototype.toExponential`
pub fn to_exponential(x: f64, fraction_digits: Option<f64>) -> JsResult<String> {
    let f = fraction_digits.map(to_integer_or_infinity);
    if !x.is_finite() {
        return Ok(number_to_string(x));
    }
    if let Some(f) = f {
        if !(0.0..=100.0).contains(&f) {
            return Err(Thrown::range_error(
                "toExponential() argument must be between 0 and 100",
            ));
        }
    }
    let sign = if x < 0.0 { "-" } else { "" };
    let x = x.abs();

    let (digits, e) = if x == 0.0 {
        let count = f.map_or(1, |f| f as usize + 1);
        ("0".repeat(count), 0)
    } else {
        let decimal = match f {
            Some(f) => Decimal::exact(x).round_to(f as i32 + 1),
            None => Decimal::shortest(x),
        };
        (decimal.digit_string(), decimal.point - 1)
    };

    let (first, rest) = digits.split_at(1);
    let mantissa = if rest.is_empty() {
        first.to_string()
    } else {
        format!("{first}.{rest}")
    };
    Ok(format!("{sign}{mantissa}{}", exponent_suffix(e)))
}

/// `Number.prototype.toPrecision`
pub fn to_precision(x: f64, precision: Option<f64>) -> JsResult<String> {
    let Some(precision) = precision else {
        return Ok(number_to_string(x));
    };
    let p = to_integer_or_infinity(precision);
    if !x.is_finite() {
        return Ok(number_to_string(x));
    }
    if !(1.0..=100.0).contains(&p) {
        return Err(Thrown::range_error(
            "toPrecision() argument must be between 1 and 100",
        ));
    }
    let p = p as i32;
    let sign = if x < 0.0 { "-" } else { "" };
    let x = x.abs();

    let (digits, e) = if x == 0.0 {
        ("0".repeat(p as usize), 0)
    } else {
        let decimal = Decimal::exact(x).round_to(p);
        (decimal.digit_string(), decimal.point - 1)
    };

    let body = if e < -6 || e >= p {
        let (first, rest) = digits.split_at(1);
        let mantissa = if rest.is_empty() {
            first.to_string()
        } else {
            format!("{first}.{rest}")
        };
        format!("{mantissa}{}", exponent_suffix(e))
    } else if e == p - 1 {
        digits
    } else if e >= 0 {
        let (int_part, frac_part) = digits.split_at(e as usize + 1);
        format!("{int_part}.{frac_part}")
    } else {
        format!("0.{}{digits}", "0".repeat((-(e + 1)) as usize))
    };
    Ok(format!("{sign}{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(1123.123), "1123.123");
        assert_eq!(number_to_string(-1.5), "-1.5");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
        assert_eq!(number_to_string(999999999999998200000.0), "999999999999998200000");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1.234e-7), "1.234e-7");
        assert_eq!(number_to_string(5e-324), "5e-324");
        assert_eq!(number_to_string(1.7976931348623157e308), "1.7976931348623157e+308");
        assert_eq!(
            number_to_string(2.1234567891234567891234567892345678),
            "2.123456789123457"
        );
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1123.123, 5.0).unwrap(), "1123.12300");
        assert_eq!(to_fixed(0.001123, 0.0).unwrap(), "0");
        assert_eq!(to_fixed(0.001123, 5.0).unwrap(), "0.00112");
        assert_eq!(to_fixed(-1.0, 0.0).unwrap(), "-1");
        assert_eq!(to_fixed(5e-324, 5.0).unwrap(), "0.00000");
        assert_eq!(to_fixed(0.5, 0.0).unwrap(), "1");
        assert_eq!(to_fixed(2.5, 0.0).unwrap(), "3");
        assert_eq!(to_fixed(1.005, 2.0).unwrap(), "1.00");
        assert_eq!(to_fixed(99.99, 1.0).unwrap(), "100.0");
        assert_eq!(
            to_fixed(999999999999998200000.0, 2.0).unwrap(),
            "999999999999998164992.00"
        );
        assert_eq!(
            to_fixed(1.7976931348623157e308, 3.0).unwrap(),
            "1.7976931348623157e+308"
        );
        assert_eq!(to_fixed(f64::NAN, 2.0).unwrap(), "NaN");
    }

    #[test]
    fn test_to_fixed_range_error() {
        let err = to_fixed(1.0, 101.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "RangeError: toFixed() digits argument must be between 0 and 100"
        );
        // Range is checked before the NaN shortcut
        assert!(to_fixed(f64::NAN, -1.0).is_err());
    }

    #[test]
    fn test_to_exponential() {
        assert_eq!(to_exponential(1123.123, Some(5.0)).unwrap(), "1.12312e+3");
        assert_eq!(to_exponential(1.0, Some(1.0)).unwrap(), "1.0e+0");
        assert_eq!(to_exponential(0.0, None).unwrap(), "0e+0");
        assert_eq!(to_exponential(0.0, Some(3.0)).unwrap(), "0.000e+0");
        assert_eq!(to_exponential(1123.123, None).unwrap(), "1.123123e+3");
        assert_eq!(
            to_exponential(999999999999998200000.0, Some(2.0)).unwrap(),
            "1.00e+21"
        );
        assert_eq!(
            to_exponential(1.7976931348623157e308, Some(3.0)).unwrap(),
            "1.798e+308"
        );
        assert_eq!(to_exponential(5e-324, Some(5.0)).unwrap(), "4.94066e-324");
        assert_eq!(to_exponential(-0.00015, Some(1.0)).unwrap(), "-1.5e-4");
        assert_eq!(to_exponential(f64::INFINITY, Some(-1.0)).unwrap(), "Infinity");
        assert_eq!(to_exponential(f64::NAN, Some(101.0)).unwrap(), "NaN");

        let err = to_exponential(1.0, Some(-1.0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "RangeError: toExponential() argument must be between 0 and 100"
        );
        assert!(to_exponential(1.0, Some(101.0)).is_err());
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(1123.123, Some(5.0)).unwrap(), "1123.1");
        assert_eq!(to_precision(11.11, Some(1.0)).unwrap(), "1e+1");
        assert_eq!(to_precision(0.0, Some(3.0)).unwrap(), "0.00");
        assert_eq!(to_precision(1123.123, None).unwrap(), "1123.123");
        assert_eq!(
            to_precision(999999999999998200000.0, Some(2.0)).unwrap(),
            "1.0e+21"
        );
        assert_eq!(
            to_precision(1.7976931348623157e308, Some(3.0)).unwrap(),
            "1.80e+308"
        );
        assert_eq!(to_precision(5e-324, Some(5.0)).unwrap(), "4.9407e-324");
        assert_eq!(to_precision(0.00012340000000000002, Some(4.0)).unwrap(), "0.0001234");
        assert_eq!(to_precision(1.234e-7, Some(2.0)).unwrap(), "1.2e-7");
        assert_eq!(to_precision(-123.456, Some(4.0)).unwrap(), "-123.5");
        assert_eq!(to_precision(f64::NAN, Some(0.0)).unwrap(), "NaN");

        for bad in [0.0, -1.0, 101.0] {
            let err = to_precision(1.0, Some(bad)).unwrap_err();
            assert_eq!(
                err.to_string(),
                "RangeError: toPrecision() argument must be between 1 and 100"
            );
        }
    }
}
