//! Runtime attribute values.
//!
//! [`AttributeValue`] is what `get_attribute` returns, what `set_attribute`
//! accepts, and what change notifications carry. Dimensioned values travel as
//! [`Quantity`] so the binding layer can convert them into the unit an
//! attribute declares for display.
//!
//! Values deserialize untagged, so bench files can write plain TOML scalars:
//!
//! ```toml
//! value = 3            # Int
//! value = 2.5          # Float
//! value = "auto"       # Text
//! value = { magnitude = 1.5, unit = "GHz" }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::UnitError;
use crate::units;

/// A physical magnitude with its unit symbol (e.g. `1.5 GHz`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// Numeric magnitude expressed in `unit`
    pub magnitude: f64,
    /// Unit symbol, optionally SI-prefixed (`"Hz"`, `"mV"`, `"us"`)
    pub unit: String,
}

impl Quantity {
    /// Create a quantity.
    pub fn new(magnitude: f64, unit: impl Into<String>) -> Self {
        Self {
            magnitude,
            unit: unit.into(),
        }
    }

    /// Express this quantity in another unit.
    pub fn to(&self, unit: &str) -> Result<Quantity, UnitError> {
        let factor = units::scale_factor(&self.unit, unit)?;
        Ok(Quantity::new(self.magnitude * factor, unit))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

/// A value read from, written to, or notified by a remote attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Dimensioned value
    Quantity(Quantity),
    /// Free-form text
    Text(String),
}

impl AttributeValue {
    /// Whether the value can drive a numeric stepper.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttributeValue::Int(_) | AttributeValue::Float(_) | AttributeValue::Quantity(_)
        )
    }

    /// Plain numbers as `f64`. Quantities return `None`: their magnitude is
    /// meaningless without a target unit.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Equality that treats `Int` and `Float` as one number line, so a
    /// device reporting `1.0` matches a declared `1`.
    pub fn same_value(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (
                AttributeValue::Int(_) | AttributeValue::Float(_),
                AttributeValue::Int(_) | AttributeValue::Float(_),
            ) => self.as_f64() == other.as_f64(),
            _ => self == other,
        }
    }

    /// Borrow the text of a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::Quantity(_) => "quantity",
            AttributeValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Quantity(q) => write!(f, "{q}"),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<Quantity> for AttributeValue {
    fn from(v: Quantity) -> Self {
        AttributeValue::Quantity(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_conversion() {
        let q = Quantity::new(2.5, "MHz").to("Hz").unwrap();
        assert_eq!(q.unit, "Hz");
        assert!((q.magnitude - 2.5e6).abs() < 1e-6);
    }

    #[test]
    fn test_same_value_spans_int_and_float() {
        assert!(AttributeValue::Int(1).same_value(&AttributeValue::Float(1.0)));
        assert!(AttributeValue::Float(2.0).same_value(&AttributeValue::Int(2)));
        assert!(!AttributeValue::Int(1).same_value(&AttributeValue::Float(1.5)));
        assert!(!AttributeValue::Int(1).same_value(&AttributeValue::from("1")));
        assert!(!AttributeValue::Bool(true).same_value(&AttributeValue::Int(1)));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(AttributeValue::from(true).to_string(), "true");
        assert_eq!(AttributeValue::from(42).to_string(), "42");
        assert_eq!(AttributeValue::from("auto").to_string(), "auto");
        assert_eq!(
            AttributeValue::from(Quantity::new(10.0, "mV")).to_string(),
            "10 mV"
        );
    }

    #[test]
    fn test_untagged_toml_values() {
        #[derive(Deserialize)]
        struct Holder {
            a: AttributeValue,
            b: AttributeValue,
            c: AttributeValue,
            d: AttributeValue,
        }

        let holder: Holder = toml::from_str(
            r#"
            a = 3
            b = 0.5
            c = "manual"
            d = { magnitude = 1.5, unit = "GHz" }
            "#,
        )
        .unwrap();

        assert_eq!(holder.a, AttributeValue::Int(3));
        assert_eq!(holder.b, AttributeValue::Float(0.5));
        assert_eq!(holder.c, AttributeValue::Text("manual".into()));
        assert_eq!(holder.d, AttributeValue::Quantity(Quantity::new(1.5, "GHz")));
    }

    #[test]
    fn test_json_roundtrip_keeps_variant() {
        let value = AttributeValue::Quantity(Quantity::new(3.0, "ms"));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"magnitude": 3.0, "unit": "ms"}));
    }

    #[test]
    fn test_numeric_classification() {
        assert!(AttributeValue::from(1.0).is_numeric());
        assert!(AttributeValue::from(Quantity::new(1.0, "V")).is_numeric());
        assert!(!AttributeValue::from("1.0").is_numeric());
        assert_eq!(AttributeValue::from(Quantity::new(1.0, "V")).as_f64(), None);
    }
}
