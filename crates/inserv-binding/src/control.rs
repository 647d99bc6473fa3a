//! Control selection policy and the toolkit-neutral control model.
//!
//! [`select_control`] maps an [`AttributeDescriptor`] plus the value read at
//! construction to a [`ControlSpec`]. It is a pure function: it matches on
//! the descriptor's [`ValueKind`] once, in this order:
//!
//! 1. `Enumerated` -> [`ControlSpec::Choice`], selection = index of the value
//! 2. `Numeric`    -> [`ControlSpec::Stepper`], value shown in the declared unit
//! 3. `Text`       -> [`ControlSpec::Text`], read-only if read-once
//! 4. `Opaque`     -> read-only [`ControlSpec::Text`] with the value's string form
//!
//! A [`Control`] wraps a spec with what a host toolkit needs to render and
//! drive it: the displayed state, whether edits are accepted, and the error
//! indicator used to surface recoverable failures.

use inserv_core::{
    AttributeDescriptor, AttributeValue, EnumOption, NumericSpec, Quantity, ValueKind,
};
use std::fmt;

use crate::error::{BindingError, BindingResult};

/// Default smallest increment of floating-point steppers.
pub const DEFAULT_FLOAT_MIN_STEP: f64 = 1e-6;

/// Default number of decimals shown by floating-point steppers.
pub const DEFAULT_FLOAT_DECIMALS: u32 = 6;

/// Construction parameters shared by every control in a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOptions {
    /// Smallest increment of floating-point steppers
    pub float_min_step: f64,
    /// Decimals shown by floating-point steppers
    pub float_decimals: u32,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            float_min_step: DEFAULT_FLOAT_MIN_STEP,
            float_decimals: DEFAULT_FLOAT_DECIMALS,
        }
    }
}

// =============================================================================
// Stepper bounds
// =============================================================================

/// Bounds applied by a numeric stepper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepperBounds {
    /// No bound declared
    Unbounded,
    /// Only a minimum
    Min(f64),
    /// Only a maximum
    Max(f64),
    /// Both ends
    Range {
        /// Minimum
        min: f64,
        /// Maximum
        max: f64,
    },
}

impl StepperBounds {
    /// Bounds from the optional ends declared on a numeric attribute.
    pub fn from_limits(lower: Option<f64>, upper: Option<f64>) -> Self {
        match (lower, upper) {
            (None, None) => StepperBounds::Unbounded,
            (Some(min), None) => StepperBounds::Min(min),
            (None, Some(max)) => StepperBounds::Max(max),
            (Some(min), Some(max)) => StepperBounds::Range { min, max },
        }
    }

    /// Clamp a value into the bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        match *self {
            StepperBounds::Unbounded => value,
            StepperBounds::Min(min) => value.max(min),
            StepperBounds::Max(max) => value.min(max),
            StepperBounds::Range { min, max } => value.max(min).min(max),
        }
    }

    /// Whether a value lies within the bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.clamp(value) == value
    }
}

impl fmt::Display for StepperBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepperBounds::Unbounded => f.write_str("(-inf, inf)"),
            StepperBounds::Min(min) => write!(f, "[{min}, inf)"),
            StepperBounds::Max(max) => write!(f, "(-inf, {max}]"),
            StepperBounds::Range { min, max } => write!(f, "[{min}, {max}]"),
        }
    }
}

// =============================================================================
// Control specs
// =============================================================================

/// Construction parameters of a numeric stepper.
#[derive(Debug, Clone, PartialEq)]
pub struct StepperSpec {
    /// Unit suffix shown after the value
    pub suffix: Option<String>,
    /// Bounds applied to committed values
    pub bounds: StepperBounds,
    /// Integer stepper (rounds committed values)
    pub integer: bool,
    /// Smallest increment
    pub step: f64,
    /// Decimals shown
    pub decimals: u32,
}

impl StepperSpec {
    /// Stepper parameters for a numeric attribute.
    pub fn for_numeric(spec: &NumericSpec, options: &ControlOptions) -> Self {
        let (step, decimals) = if spec.is_integer {
            (1.0, 0)
        } else {
            (options.float_min_step, options.float_decimals)
        };
        Self {
            suffix: spec.unit.clone(),
            bounds: StepperBounds::from_limits(spec.lower_bound, spec.upper_bound),
            integer: spec.is_integer,
            step,
            decimals,
        }
    }

    /// Bring a committed value onto the stepper's grid and into its bounds.
    pub fn constrain(&self, value: f64) -> f64 {
        let value = if self.integer { value.round() } else { value };
        self.bounds.clamp(value)
    }

    /// Format a value the way the stepper displays it.
    pub fn format(&self, value: f64) -> String {
        let number = format!("{:.*}", self.decimals as usize, value);
        match &self.suffix {
            Some(unit) => format!("{number} {unit}"),
            None => number,
        }
    }
}

/// Which interactive control an attribute gets, with its displayed state.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSpec {
    /// Drop-down of labels
    Choice {
        /// Option labels in declaration order
        labels: Vec<String>,
        /// Index of the displayed option
        selected: usize,
    },
    /// Numeric spin box
    Stepper {
        /// Stepper parameters
        spec: StepperSpec,
        /// Displayed value, in the stepper's unit
        value: f64,
    },
    /// Single-line text field
    Text {
        /// Displayed text
        value: String,
        /// Field rejects edits
        read_only: bool,
    },
}

/// Discriminant of [`ControlSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Drop-down
    Choice,
    /// Numeric spin box
    Stepper,
    /// Editable text field
    Text,
    /// Read-only text field
    ReadOnlyText,
}

impl ControlSpec {
    /// Discriminant of this spec.
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlSpec::Choice { .. } => ControlKind::Choice,
            ControlSpec::Stepper { .. } => ControlKind::Stepper,
            ControlSpec::Text { read_only: false, .. } => ControlKind::Text,
            ControlSpec::Text { read_only: true, .. } => ControlKind::ReadOnlyText,
        }
    }

    /// Text a renderer shows for the current state.
    pub fn display_text(&self) -> String {
        match self {
            ControlSpec::Choice { labels, selected } => {
                labels.get(*selected).cloned().unwrap_or_default()
            }
            ControlSpec::Stepper { spec, value } => spec.format(*value),
            ControlSpec::Text { value, .. } => value.clone(),
        }
    }
}

// =============================================================================
// Selection policy
// =============================================================================

/// Index of `value` among the allowed options.
pub(crate) fn choice_index(
    attribute: &str,
    allowed: &[EnumOption],
    value: &AttributeValue,
) -> BindingResult<usize> {
    allowed
        .iter()
        .position(|option| option.value.same_value(value))
        .ok_or_else(|| BindingError::ValueNotInDomain {
            attribute: attribute.to_string(),
            value: value.to_string(),
        })
}

/// Magnitude of a numeric value expressed in the attribute's display unit.
pub(crate) fn numeric_display(
    attribute: &str,
    spec: &NumericSpec,
    value: &AttributeValue,
) -> BindingResult<f64> {
    match value {
        AttributeValue::Quantity(q) => match &spec.unit {
            Some(unit) => q
                .to(unit)
                .map(|converted| converted.magnitude)
                .map_err(|source| BindingError::Units {
                    attribute: attribute.to_string(),
                    source,
                }),
            None => Ok(q.magnitude),
        },
        other => other.as_f64().ok_or_else(|| BindingError::ValueKindMismatch {
            attribute: attribute.to_string(),
            expected: "numeric",
            found: other.type_name(),
        }),
    }
}

/// Pick the control for an attribute given the value read at construction.
///
/// Never touches the remote attribute.
///
/// # Errors
///
/// - [`BindingError::ValueNotInDomain`] if an enumerated value is not allowed
/// - [`BindingError::ValueKindMismatch`] if the value contradicts the kind
/// - [`BindingError::Units`] if a quantity cannot be shown in the declared unit
pub fn select_control(
    descriptor: &AttributeDescriptor,
    value: &AttributeValue,
    options: &ControlOptions,
) -> BindingResult<ControlSpec> {
    let name = descriptor.name.as_str();
    match &descriptor.kind {
        ValueKind::Enumerated(allowed) => Ok(ControlSpec::Choice {
            labels: allowed.iter().map(|o| o.label.clone()).collect(),
            selected: choice_index(name, allowed, value)?,
        }),
        ValueKind::Numeric(spec) => Ok(ControlSpec::Stepper {
            spec: StepperSpec::for_numeric(spec, options),
            value: numeric_display(name, spec, value)?,
        }),
        ValueKind::Text => match value {
            AttributeValue::Text(text) => Ok(ControlSpec::Text {
                value: text.clone(),
                read_only: descriptor.read_once,
            }),
            other => Err(BindingError::ValueKindMismatch {
                attribute: name.to_string(),
                expected: "text",
                found: other.type_name(),
            }),
        },
        ValueKind::Opaque => Ok(ControlSpec::Text {
            value: value.to_string(),
            read_only: true,
        }),
    }
}

// =============================================================================
// Edits
// =============================================================================

/// A value committed by the user through a control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEdit {
    /// Option index chosen in a choice control
    Select(usize),
    /// Number entered in a stepper, in the stepper's unit
    Number(f64),
    /// Text entered in a text field
    Text(String),
}

impl ControlEdit {
    /// Interpret user input for a given control.
    ///
    /// Choice controls accept a label or an option index; steppers accept a
    /// number; text fields accept anything.
    pub fn parse_for(spec: &ControlSpec, input: &str) -> Option<ControlEdit> {
        let input = input.trim();
        match spec {
            ControlSpec::Choice { labels, .. } => labels
                .iter()
                .position(|label| label == input)
                .or_else(|| input.parse::<usize>().ok().filter(|i| *i < labels.len()))
                .map(ControlEdit::Select),
            ControlSpec::Stepper { .. } => input.parse::<f64>().ok().map(ControlEdit::Number),
            ControlSpec::Text { .. } => Some(ControlEdit::Text(input.to_string())),
        }
    }
}

/// Resolve an edit against a descriptor: the state to display and the
/// value to write, in the attribute's native form.
pub(crate) fn resolve_edit(
    descriptor: &AttributeDescriptor,
    spec: &ControlSpec,
    edit: ControlEdit,
) -> BindingResult<(ControlSpec, AttributeValue)> {
    let invalid = |reason: String| BindingError::InvalidEdit {
        attribute: descriptor.name.clone(),
        reason,
    };
    match (&descriptor.kind, spec, edit) {
        (ValueKind::Enumerated(allowed), ControlSpec::Choice { labels, .. }, ControlEdit::Select(index)) => {
            let option = allowed
                .get(index)
                .ok_or_else(|| invalid(format!("option {index} out of range")))?;
            Ok((
                ControlSpec::Choice {
                    labels: labels.clone(),
                    selected: index,
                },
                option.value.clone(),
            ))
        }
        (ValueKind::Numeric(numeric), ControlSpec::Stepper { spec: stepper, .. }, ControlEdit::Number(raw)) => {
            if !raw.is_finite() {
                return Err(invalid(format!("{raw} is not a finite number")));
            }
            let value = stepper.constrain(raw);
            let remote = match &numeric.unit {
                Some(unit) => AttributeValue::Quantity(Quantity::new(value, unit.clone())),
                None if numeric.is_integer => {
                    // 2^63; `as` would saturate silently past it
                    const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;
                    if !(-I64_LIMIT..I64_LIMIT).contains(&value) {
                        return Err(invalid(format!("{raw} is outside the integer range")));
                    }
                    AttributeValue::Int(value as i64)
                }
                None => AttributeValue::Float(value),
            };
            Ok((
                ControlSpec::Stepper {
                    spec: stepper.clone(),
                    value,
                },
                remote,
            ))
        }
        (ValueKind::Text, ControlSpec::Text { read_only, .. }, ControlEdit::Text(text)) => Ok((
            ControlSpec::Text {
                value: text.clone(),
                read_only: *read_only,
            },
            AttributeValue::Text(text),
        )),
        (kind, _, edit) => Err(invalid(format!(
            "{edit:?} does not apply to a {} control",
            kind.name()
        ))),
    }
}

// =============================================================================
// Control
// =============================================================================

/// Toolkit-neutral state of one interactive control.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    spec: ControlSpec,
    read_only: bool,
    error: Option<String>,
}

impl Control {
    /// Control in the state described by `spec`.
    pub fn new(spec: ControlSpec, read_only: bool) -> Self {
        let read_only = read_only || matches!(spec, ControlSpec::Text { read_only: true, .. });
        Self {
            spec,
            read_only,
            error: None,
        }
    }

    /// Current state.
    pub fn spec(&self) -> &ControlSpec {
        &self.spec
    }

    /// Kind of control.
    pub fn kind(&self) -> ControlKind {
        self.spec.kind()
    }

    /// Whether the control rejects user edits.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Text a renderer shows.
    pub fn display_text(&self) -> String {
        self.spec.display_text()
    }

    /// Displayed stepper value, if this is a stepper.
    pub fn stepper_value(&self) -> Option<f64> {
        match &self.spec {
            ControlSpec::Stepper { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Selected option index, if this is a choice control.
    pub fn selected_index(&self) -> Option<usize> {
        match &self.spec {
            ControlSpec::Choice { selected, .. } => Some(*selected),
            _ => None,
        }
    }

    /// Recoverable error currently flagged on the control.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Bounds interval of a stepper, for rendering.
    pub fn bounds_interval(&self) -> Option<String> {
        match &self.spec {
            ControlSpec::Stepper { spec, .. } => Some(spec.bounds.to_string()),
            _ => None,
        }
    }

    pub(crate) fn show(&mut self, spec: ControlSpec) {
        self.spec = spec;
    }

    pub(crate) fn flag_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    /// Show a value reported by the remote side.
    pub(crate) fn refresh(
        &mut self,
        descriptor: &AttributeDescriptor,
        value: &AttributeValue,
    ) -> BindingResult<()> {
        let name = descriptor.name.as_str();
        match (&descriptor.kind, &mut self.spec) {
            (ValueKind::Enumerated(allowed), ControlSpec::Choice { selected, .. }) => {
                *selected = choice_index(name, allowed, value)?;
            }
            (ValueKind::Numeric(numeric), ControlSpec::Stepper { value: shown, .. }) => {
                *shown = numeric_display(name, numeric, value)?;
            }
            (ValueKind::Text, ControlSpec::Text { value: shown, .. }) => match value {
                AttributeValue::Text(text) => shown.clone_from(text),
                other => {
                    return Err(BindingError::ValueKindMismatch {
                        attribute: name.to_string(),
                        expected: "text",
                        found: other.type_name(),
                    })
                }
            },
            (ValueKind::Opaque, ControlSpec::Text { value: shown, .. }) => {
                *shown = value.to_string();
            }
            (kind, _) => {
                return Err(BindingError::ValueKindMismatch {
                    attribute: name.to_string(),
                    expected: kind.name(),
                    found: value.type_name(),
                })
            }
        }
        Ok(())
    }
}
