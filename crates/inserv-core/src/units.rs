//! SI-prefix unit conversion.
//!
//! Two unit symbols are compatible when they reduce to the same base symbol
//! after stripping an optional SI prefix: `"GHz"` and `"Hz"` share `"Hz"`,
//! `"mm"` and `"m"` share `"m"`. A bare symbol is never split, so `"m"` is
//! metres rather than a dangling milli prefix.

use crate::error::UnitError;

/// SI prefixes with their decimal exponents. `da` is listed before `d`
/// so the two-letter prefix wins.
const SI_PREFIXES: &[(&str, i32)] = &[
    ("Y", 24),
    ("Z", 21),
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("h", 2),
    ("da", 1),
    ("d", -1),
    ("c", -2),
    ("m", -3),
    ("u", -6),
    ("\u{b5}", -6),
    ("\u{3bc}", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
    ("a", -18),
    ("z", -21),
    ("y", -24),
];

/// Candidate `(exponent, base)` readings of a unit symbol, unprefixed first.
fn readings(unit: &str) -> Vec<(i32, &str)> {
    let mut out = vec![(0, unit)];
    for (prefix, exp) in SI_PREFIXES {
        if let Some(base) = unit.strip_prefix(prefix) {
            if !base.is_empty() {
                out.push((*exp, base));
            }
        }
    }
    out
}

/// Factor that converts a magnitude in `from` into a magnitude in `to`.
///
/// ```
/// use inserv_core::units::scale_factor;
///
/// assert_eq!(scale_factor("kHz", "Hz").unwrap(), 1e3);
/// assert!(scale_factor("Hz", "V").is_err());
/// ```
pub fn scale_factor(from: &str, to: &str) -> Result<f64, UnitError> {
    if from == to {
        return Ok(1.0);
    }
    let targets = readings(to);
    for (from_exp, from_base) in readings(from) {
        if let Some((to_exp, _)) = targets.iter().find(|(_, base)| *base == from_base) {
            return Ok(10f64.powi(from_exp - to_exp));
        }
    }
    Err(UnitError::Incompatible {
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// Whether a magnitude in `from` can be expressed in `to`.
pub fn compatible(from: &str, to: &str) -> bool {
    scale_factor(from, to).is_ok()
}
