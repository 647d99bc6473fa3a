//! Locally held parameter forms.
//!
//! A [`ParamsForm`] is an ordered set of parameters that live on the console
//! side only (dialog inputs, session settings). Each parameter gets the same
//! stepper or text control a bound attribute of that kind would get, but
//! edits stay local: nothing is read from or written to a gateway.

use inserv_core::{AttributeDescriptor, AttributeValue, NumericSpec};

use crate::control::{resolve_edit, select_control, Control, ControlEdit, ControlOptions};
use crate::error::{BindingError, BindingResult};

#[derive(Debug, Clone)]
struct Param {
    descriptor: AttributeDescriptor,
    label: Option<String>,
    control: Control,
    value: AttributeValue,
}

/// Ordered set of local parameters.
#[derive(Debug, Clone, Default)]
pub struct ParamsForm {
    options: ControlOptions,
    params: Vec<Param>,
}

impl ParamsForm {
    /// Empty form.
    pub fn new(options: ControlOptions) -> Self {
        Self {
            options,
            params: Vec::new(),
        }
    }

    fn push(
        &mut self,
        descriptor: AttributeDescriptor,
        label: Option<&str>,
        value: AttributeValue,
    ) -> BindingResult<()> {
        if self.position(&descriptor.name).is_some() {
            return Err(BindingError::DuplicateParameter(descriptor.name));
        }
        let control = Control::new(select_control(&descriptor, &value, &self.options)?, false);
        self.params.push(Param {
            descriptor,
            label: label.map(str::to_string),
            control,
            value,
        });
        Ok(())
    }

    /// Add a numeric parameter.
    pub fn add_numeric(
        &mut self,
        name: &str,
        label: Option<&str>,
        spec: NumericSpec,
        initial: f64,
    ) -> BindingResult<()> {
        let descriptor = AttributeDescriptor::numeric(name, spec);
        let control = select_control(&descriptor, &AttributeValue::Float(initial), &self.options)?;
        // Store the initial value the way an edit would produce it.
        let (_, value) = resolve_edit(&descriptor, &control, ControlEdit::Number(initial))?;
        self.push(descriptor, label, value)
    }

    /// Add a text parameter.
    pub fn add_text(&mut self, name: &str, label: Option<&str>, initial: &str) -> BindingResult<()> {
        self.push(AttributeDescriptor::text(name), label, initial.into())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.descriptor.name == name)
    }

    fn param_mut(&mut self, name: &str) -> BindingResult<&mut Param> {
        let index = self
            .position(name)
            .ok_or_else(|| BindingError::UnknownPath(name.to_string()))?;
        Ok(&mut self.params[index])
    }

    /// Apply an edit to a parameter.
    pub fn set(&mut self, name: &str, edit: ControlEdit) -> BindingResult<()> {
        let param = self.param_mut(name)?;
        let (shown, value) = resolve_edit(&param.descriptor, param.control.spec(), edit)?;
        param.control.show(shown);
        param.value = value;
        Ok(())
    }

    /// Apply text typed by the user to a parameter.
    pub fn set_input(&mut self, name: &str, input: &str) -> BindingResult<()> {
        let param = self.param_mut(name)?;
        let edit = ControlEdit::parse_for(param.control.spec(), input).ok_or_else(|| {
            BindingError::InvalidEdit {
                attribute: name.to_string(),
                reason: format!("'{input}' is not a number"),
            }
        })?;
        self.set(name, edit)
    }

    /// Current value of a parameter.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.position(name).map(|i| &self.params[i].value)
    }

    /// Current value of a numeric parameter, in its declared unit.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            AttributeValue::Quantity(q) => Some(q.magnitude),
            other => other.as_f64(),
        }
    }

    /// Control of a parameter.
    pub fn control(&self, name: &str) -> Option<&Control> {
        self.position(name).map(|i| &self.params[i].control)
    }

    /// Display label of a parameter (its name unless labelled).
    pub fn label(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| {
            let param = &self.params[i];
            param.label.as_deref().unwrap_or(&param.descriptor.name)
        })
    }

    /// Every parameter as `(name, value)`, in the order added.
    pub fn all_params(&self) -> Vec<(String, AttributeValue)> {
        self.params
            .iter()
            .map(|p| (p.descriptor.name.clone(), p.value.clone()))
            .collect()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True if the form has no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inserv_core::Quantity;

    fn form() -> ParamsForm {
        let mut form = ParamsForm::new(ControlOptions::default());
        form.add_numeric(
            "duration",
            Some("Watch duration"),
            NumericSpec::float().with_unit("s").with_min(0.0),
            10.0,
        )
        .unwrap();
        form.add_numeric("repeats", None, NumericSpec::integer().with_bounds(1.0, 100.0), 3.0)
            .unwrap();
        form.add_text("note", None, "").unwrap();
        form
    }

    #[test]
    fn test_values_keep_declared_shape() {
        let form = form();
        assert_eq!(
            form.get("duration"),
            Some(&AttributeValue::Quantity(Quantity::new(10.0, "s")))
        );
        assert_eq!(form.get("repeats"), Some(&AttributeValue::Int(3)));
        assert_eq!(form.label("duration"), Some("Watch duration"));
        assert_eq!(form.label("repeats"), Some("repeats"));
    }

    #[test]
    fn test_set_clamps_like_a_stepper() {
        let mut form = form();
        form.set("repeats", ControlEdit::Number(250.0)).unwrap();
        assert_eq!(form.get_f64("repeats"), Some(100.0));
        form.set_input("duration", "-4").unwrap();
        assert_eq!(form.get_f64("duration"), Some(0.0));
    }

    #[test]
    fn test_all_params_in_order() {
        let mut form = form();
        form.set_input("note", "cold start").unwrap();
        let names: Vec<String> = form.all_params().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["duration", "repeats", "note"]);
        assert_eq!(form.get("note"), Some(&AttributeValue::from("cold start")));
    }

    #[test]
    fn test_unknown_and_duplicate_names() {
        let mut form = form();
        assert!(matches!(
            form.set("missing", ControlEdit::Number(1.0)),
            Err(BindingError::UnknownPath(_))
        ));
        assert_eq!(
            form.add_text("note", None, "again"),
            Err(BindingError::DuplicateParameter("note".into()))
        );
        assert_eq!(form.get("note"), Some(&AttributeValue::from("")));
        assert_eq!(form.len(), 3);
        assert!(form.set_input("repeats", "many").is_err());
    }
}
