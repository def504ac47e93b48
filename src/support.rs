//! Branch support values.
//!
//! A bootstrap proportion is usually an integer percentage (`97`) and a
//! posterior probability a real in `[0, 1]` (`0.99`). Thresholds compare
//! both as `f64`; the integer/real flavour read from the file is kept only
//! so the value prints back the way it was written.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Integer(i64),
    Real(f64),
}

impl Confidence {
    /// Interpret a node label as a support value.
    ///
    /// All-digit labels become integers, anything else that parses as a
    /// finite float becomes a real. Returns `None` for free text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(v) = text.parse::<i64>() {
                return Some(Confidence::Integer(v));
            }
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(Confidence::Real(v)),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Confidence::Integer(v) => v as f64,
            Confidence::Real(v) => v,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Integer(v) => write!(f, "{v}"),
            Confidence::Real(v) => f.write_str(&format_real(*v)),
        }
    }
}

/// Shortest round-trip form with a fractional part (`1.0`, `0.99`), and
/// exponents signed and at least two digits wide (`1e-05`, `1e+16`).
fn format_real(v: f64) -> String {
    // Debug switches to an exponent outside [1e-4, 1e16)
    let raw = format!("{v:?}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    match exponent.parse::<i32>() {
        Ok(exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        Err(_) => raw,
    }
}

impl From<i64> for Confidence {
    fn from(v: i64) -> Self {
        Confidence::Integer(v)
    }
}

impl From<f64> for Confidence {
    fn from(v: f64) -> Self {
        Confidence::Real(v)
    }
}
