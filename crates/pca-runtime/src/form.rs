#![forbid(unsafe_code)]

//! Form engine: field values, validation, touched tracking and the submit
//! lifecycle.
//!
//! State lives in an [`Observable<FormState>`] so pages can subscribe and
//! re-render. The engine itself is a cheap handle (`Clone` shares state).
//!
//! # Invariants
//!
//! 1. `errors` holds exactly the failing fields; passing fields have no
//!    key.
//! 2. `is_submitting` is true only while `on_submit` is pending, and is
//!    cleared on success, failure and when the submit future is dropped.
//! 3. Editing a field clears its error immediately. With
//!    `validate_on_change`, the re-validation of a touched field runs after
//!    the edit has settled, never inside it.
//! 4. `handle_submit` never calls `on_submit` with invalid values.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use pca_core::validation::{FieldErrors, ValidationRules, validate_form};
use pca_core::value::{Fields, parse_number_prefix};
use serde_json::Value;
use tracing::debug;

use crate::reactive::{BatchScope, Observable, defer_or_run};

type Transform = Rc<dyn Fn(Fields) -> Fields>;
type SubmitFn<E> = Rc<dyn Fn(Fields) -> LocalBoxFuture<'static, Result<(), E>>>;

/// Behaviour switches shared by every form of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormFlags {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub reset_on_submit: bool,
}

impl Default for FormFlags {
    fn default() -> Self {
        Self {
            validate_on_change: false,
            validate_on_blur: true,
            reset_on_submit: false,
        }
    }
}

/// Initial values, rules and flags for one form.
#[derive(Clone, Default)]
pub struct FormConfig {
    pub initial_values: Fields,
    pub rules: ValidationRules,
    pub flags: FormFlags,
    transform: Option<Transform>,
}

impl std::fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormConfig")
            .field("initial_values", &self.initial_values)
            .field("rules", &self.rules)
            .field("flags", &self.flags)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl FormConfig {
    #[must_use]
    pub fn new(initial_values: Fields) -> Self {
        Self {
            initial_values,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: FormFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.flags.validate_on_change = enabled;
        self
    }

    #[must_use]
    pub fn validate_on_blur(mut self, enabled: bool) -> Self {
        self.flags.validate_on_blur = enabled;
        self
    }

    #[must_use]
    pub fn reset_on_submit(mut self, enabled: bool) -> Self {
        self.flags.reset_on_submit = enabled;
        self
    }

    /// Rewrite values right before they are handed to `on_submit`.
    #[must_use]
    pub fn transform(mut self, f: impl Fn(Fields) -> Fields + 'static) -> Self {
        self.transform = Some(Rc::new(f));
        self
    }
}

/// Raw input from a form control.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text(String),
    /// Text typed into a numeric control. Unparsable input becomes `0`.
    Number(String),
    Checkbox(bool),
}

impl FieldInput {
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Checkbox(checked) => Value::Bool(checked),
            Self::Number(text) => number_value(parse_number_prefix(&text).unwrap_or(0.0)),
        }
    }
}

fn number_value(n: f64) -> Value {
    if !n.is_finite() || n == 0.0 {
        return Value::from(0);
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or_else(|| Value::from(0), Value::Number)
}

/// Everything a page renders from a form.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormState {
    pub values: Fields,
    pub errors: FieldErrors,
    pub touched: BTreeMap<String, bool>,
    pub is_submitting: bool,
    pub submit_count: u32,
}

/// The submit event of a form control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// What [`FormEngine::handle_submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// `on_submit` ran and succeeded.
    Submitted,
    /// Validation failed; `on_submit` was not called.
    Invalid,
    /// A submission was already in flight; nothing happened.
    AlreadySubmitting,
}

struct FormInner<E> {
    config: RefCell<FormConfig>,
    on_submit: SubmitFn<E>,
    state: Observable<FormState>,
}

/// Clears `is_submitting` however the submit path ends.
struct SubmittingGuard {
    state: Observable<FormState>,
}

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        self.state.update(|s| s.is_submitting = false);
    }
}

/// Handle to one form. `E` is the error type of the submit callback.
pub struct FormEngine<E> {
    inner: Rc<FormInner<E>>,
}

impl<E> Clone for FormEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for FormEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormEngine")
            .field("config", &self.inner.config.borrow())
            .field("state", &self.inner.state)
            .finish()
    }
}

impl<E: 'static> FormEngine<E> {
    pub fn new<F, Fut>(config: FormConfig, on_submit: F) -> Self
    where
        F: Fn(Fields) -> Fut + 'static,
        Fut: Future<Output = Result<(), E>> + 'static,
    {
        let state = Observable::new(FormState {
            values: config.initial_values.clone(),
            ..FormState::default()
        });
        let on_submit: SubmitFn<E> =
            Rc::new(move |values| -> LocalBoxFuture<'static, Result<(), E>> {
                Box::pin(on_submit(values))
            });
        Self {
            inner: Rc::new(FormInner {
                config: RefCell::new(config),
                on_submit,
                state,
            }),
        }
    }

    fn from_weak(weak: &Weak<FormInner<E>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn flags(&self) -> FormFlags {
        self.inner.config.borrow().flags
    }

    /// Store the input of a control and clear its error.
    pub fn handle_change(&self, field: &str, input: FieldInput) {
        let value = input.into_value();
        let _batch = BatchScope::new();
        self.inner.state.update(|s| {
            s.values.insert(field.to_string(), value);
            s.errors.remove(field);
        });

        let touched = self.is_touched(field);
        if self.flags().validate_on_change && touched {
            let weak = Rc::downgrade(&self.inner);
            let name = field.to_string();
            defer_or_run(move || {
                if let Some(form) = Self::from_weak(&weak) {
                    form.validate_field(&name);
                }
            });
        }
    }

    /// Mark `field` touched and, with `validate_on_blur`, validate it.
    pub fn handle_blur(&self, field: &str) {
        let _batch = BatchScope::new();
        self.inner.state.update(|s| {
            s.touched.insert(field.to_string(), true);
        });
        if self.flags().validate_on_blur {
            self.validate_field(field);
        }
    }

    /// Validate every field with rules and replace `errors`. Returns
    /// whether the form is valid.
    pub fn validate(&self) -> bool {
        let errors = {
            let config = self.inner.config.borrow();
            self.inner
                .state
                .with(|s| validate_form(&s.values, &config.rules))
        };
        let valid = errors.is_empty();
        debug!(target: "pca.form", valid, failing = errors.len(), "form validated");
        self.inner.state.update(|s| s.errors = errors);
        valid
    }

    /// Validate one field. Returns its error, if any.
    ///
    /// Fields without rules are left alone.
    pub fn validate_field(&self, field: &str) -> Option<String> {
        let error = {
            let config = self.inner.config.borrow();
            if !config.rules.field_names().any(|name| name == field) {
                return None;
            }
            let value = self.value(field);
            config.rules.validate_field(field, &value)
        };
        let stored = error.clone();
        self.inner.state.update(|s| match stored {
            Some(message) => {
                s.errors.insert(field.to_string(), message);
            }
            _ => {
                s.errors.remove(field);
            }
        });
        error
    }

    /// Validate and, when valid, hand the (transformed) values to
    /// `on_submit`.
    ///
    /// Errors from `on_submit` are returned to the caller after
    /// `is_submitting` has been cleared.
    pub async fn handle_submit(&self, event: Option<&mut SubmitEvent>) -> Result<SubmitOutcome, E> {
        if let Some(event) = event {
            event.prevent_default();
        }
        if self.is_submitting() {
            debug!(target: "pca.form", "submit ignored, already submitting");
            return Ok(SubmitOutcome::AlreadySubmitting);
        }

        let field_names: Vec<String> = self
            .inner
            .config
            .borrow()
            .rules
            .field_names()
            .map(str::to_string)
            .collect();
        self.inner.state.update(|s| {
            s.submit_count += 1;
            let keys: Vec<String> = s.values.keys().cloned().chain(field_names).collect();
            for key in keys {
                s.touched.insert(key, true);
            }
        });

        if !self.validate() {
            debug!(
                target: "pca.form",
                errors = ?self.errors(),
                "submit blocked by validation"
            );
            return Ok(SubmitOutcome::Invalid);
        }

        let values = self.values();
        let transform = self.inner.config.borrow().transform.clone();
        let values = match transform {
            Some(transform) => transform(values),
            None => values,
        };

        debug!(target: "pca.form", submit_count = self.submit_count(), "submitting form");
        self.inner.state.update(|s| s.is_submitting = true);
        let guard = SubmittingGuard {
            state: self.inner.state.clone(),
        };
        let result = (self.inner.on_submit)(values).await;
        drop(guard);

        match result {
            Ok(()) => {
                debug!(target: "pca.form", "submit succeeded");
                if self.flags().reset_on_submit {
                    self.reset(None);
                }
                Ok(SubmitOutcome::Submitted)
            }
            Err(err) => {
                debug!(target: "pca.form", "submit failed");
                Err(err)
            }
        }
    }

    /// Restore values (to `values` or the configured initial values) and
    /// clear errors, touched flags and submit bookkeeping.
    pub fn reset(&self, values: Option<Fields>) {
        let values = values.unwrap_or_else(|| self.inner.config.borrow().initial_values.clone());
        debug!(target: "pca.form", fields = values.len(), "form reset");
        self.inner.state.set(FormState {
            values,
            ..FormState::default()
        });
    }

    /// Switch to new initial values, e.g. when another record is edited.
    ///
    /// Values are replaced and errors/touched cleared; the submit counter
    /// is kept.
    pub fn reconfigure(&self, initial_values: Fields) {
        self.inner.config.borrow_mut().initial_values = initial_values.clone();
        debug!(target: "pca.form", fields = initial_values.len(), "form reconfigured");
        self.inner.state.update(|s| {
            s.values = initial_values;
            s.errors.clear();
            s.touched.clear();
        });
    }

    /// Replace the rule set. Existing errors are kept until the next
    /// validation.
    pub fn set_rules(&self, rules: ValidationRules) {
        self.inner.config.borrow_mut().rules = rules;
    }

    pub fn set_field_value(&self, field: &str, value: Value) {
        self.inner.state.update(|s| {
            s.values.insert(field.to_string(), value);
        });
    }

    /// Set or, with `None` or an empty message, clear the error of one field.
    pub fn set_field_error(&self, field: &str, error: Option<String>) {
        self.inner.state.update(|s| match error {
            Some(message) if !message.is_empty() => {
                s.errors.insert(field.to_string(), message);
            }
            _ => {
                s.errors.remove(field);
            }
        });
    }

    /// Replace all errors at once, e.g. with server-side validation results.
    /// Empty messages are dropped.
    pub fn set_form_errors(&self, mut errors: FieldErrors) {
        errors.retain(|_, message| !message.is_empty());
        self.inner.state.update(|s| s.errors = errors);
    }

    #[must_use]
    pub fn values(&self) -> Fields {
        self.inner.state.with(|s| s.values.clone())
    }

    /// Current value of one field (`Null` when unset).
    #[must_use]
    pub fn value(&self, field: &str) -> Value {
        self.inner
            .state
            .with(|s| s.values.get(field).cloned().unwrap_or(Value::Null))
    }

    #[must_use]
    pub fn errors(&self) -> FieldErrors {
        self.inner.state.with(|s| s.errors.clone())
    }

    #[must_use]
    pub fn error(&self, field: &str) -> Option<String> {
        self.inner.state.with(|s| s.errors.get(field).cloned())
    }

    #[must_use]
    pub fn touched(&self) -> BTreeMap<String, bool> {
        self.inner.state.with(|s| s.touched.clone())
    }

    #[must_use]
    pub fn is_touched(&self, field: &str) -> bool {
        self.inner
            .state
            .with(|s| s.touched.get(field).copied().unwrap_or(false))
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.inner.state.with(|s| s.is_submitting)
    }

    #[must_use]
    pub fn submit_count(&self) -> u32 {
        self.inner.state.with(|s| s.submit_count)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.state.with(|s| s.errors.is_empty())
    }

    /// Whether values differ from the configured initial values.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let config = self.inner.config.borrow();
        self.inner
            .state
            .with(|s| s.values != config.initial_values)
    }

    #[must_use]
    pub fn state(&self) -> &Observable<FormState> {
        &self.inner.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pca_core::validation::{Rule, min_len, positive, required};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn form(config: FormConfig) -> FormEngine<String> {
        FormEngine::new(config, |_| async { Ok::<(), String>(()) })
    }

    #[test]
    fn number_inputs_coerce() {
        assert_eq!(FieldInput::Number("12".into()).into_value(), json!(12));
        assert_eq!(FieldInput::Number("2.5kg".into()).into_value(), json!(2.5));
        assert_eq!(FieldInput::Number("abc".into()).into_value(), json!(0));
        assert_eq!(FieldInput::Checkbox(true).into_value(), json!(true));
    }

    #[test]
    fn change_clears_error_without_validating() {
        let f = form(
            FormConfig::new(fields(json!({ "item": "" })))
                .rules(ValidationRules::new().field("item", [required(), min_len(3)])),
        );
        assert!(!f.validate());
        assert!(f.error("item").is_some());

        f.handle_change("item", FieldInput::Text("ab".into()));
        assert_eq!(f.error("item"), None);
        assert!(f.is_valid());
    }

    #[test]
    fn empty_messages_are_not_errors() {
        let silent = Rule::custom(|_, _| Some(String::new()));
        let f = form(
            FormConfig::new(fields(json!({ "item": "" })))
                .rules(ValidationRules::new().field("item", [silent, required()])),
        );
        assert!(!f.validate());
        assert_eq!(f.error("item"), Some("item é obrigatório".to_string()));

        f.set_field_value("item", json!("Cadeira"));
        assert!(f.validate());
        assert!(f.errors().is_empty());

        f.set_field_error("item", Some(String::new()));
        assert!(f.is_valid());
        f.set_form_errors(FieldErrors::from([("item".to_string(), String::new())]));
        assert!(f.is_valid());
        assert_eq!(f.error("item"), None);
    }

    #[test]
    fn blur_touches_and_validates() {
        let f = form(
            FormConfig::new(fields(json!({ "item": "" })))
                .rules(ValidationRules::new().field("item", [required()])),
        );
        f.handle_blur("item");
        assert!(f.is_touched("item"));
        assert!(f.error("item").is_some());

        let quiet = form(
            FormConfig::new(fields(json!({ "item": "" })))
                .rules(ValidationRules::new().field("item", [required()]))
                .validate_on_blur(false),
        );
        quiet.handle_blur("item");
        assert_eq!(quiet.error("item"), None);
    }

    #[test]
    fn validate_on_change_runs_after_the_edit_settles() {
        let f = form(
            FormConfig::new(fields(json!({ "item": "" })))
                .rules(ValidationRules::new().field("item", [min_len(3)]))
                .validate_on_change(true),
        );
        f.handle_blur("item");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = f
            .state()
            .subscribe(move |s: &FormState| sink.borrow_mut().push(s.errors.contains_key("item")));

        f.handle_change("item", FieldInput::Text("ab".into()));
        assert!(f.error("item").is_some());
        // The edit is published before its validation.
        assert_eq!(*seen.borrow(), vec![false, true]);

        f.handle_change("item", FieldInput::Text("abc".into()));
        assert_eq!(f.error("item"), None);
    }

    #[test]
    fn untouched_field_is_not_validated_on_change() {
        let f = form(
            FormConfig::new(fields(json!({ "item": "" })))
                .rules(ValidationRules::new().field("item", [min_len(3)]))
                .validate_on_change(true),
        );
        f.handle_change("item", FieldInput::Text("ab".into()));
        assert_eq!(f.error("item"), None);
    }

    #[test]
    fn validate_field_without_rules_is_noop() {
        let f = form(FormConfig::new(fields(json!({ "obs": "" }))));
        f.set_field_error("obs", Some("manual".into()));
        assert_eq!(f.validate_field("obs"), None);
        assert_eq!(f.error("obs"), Some("manual".into()));
        f.set_field_error("obs", None);
        assert!(f.errors().is_empty());
    }

    #[test]
    fn dirty_tracks_initial_values() {
        let f = form(FormConfig::new(fields(json!({ "quantidade": 1 }))));
        assert!(!f.is_dirty());
        f.handle_change("quantidade", FieldInput::Number("2".into()));
        assert!(f.is_dirty());
        f.handle_change("quantidade", FieldInput::Number("1".into()));
        assert!(!f.is_dirty());
    }

    #[test]
    fn reconfigure_replaces_values_and_clears_marks() {
        let f = form(
            FormConfig::new(fields(json!({ "quantidade": 0 })))
                .rules(ValidationRules::new().field("quantidade", [positive()])),
        );
        f.handle_blur("quantidade");
        assert!(!f.is_valid());

        f.reconfigure(fields(json!({ "quantidade": 5 })));
        assert!(f.is_valid());
        assert!(f.touched().is_empty());
        assert_eq!(f.value("quantidade"), json!(5));
        assert!(!f.is_dirty());
    }

    #[test]
    fn reset_uses_given_values_but_keeps_initial_for_dirty() {
        let f = form(FormConfig::new(fields(json!({ "item": "" }))));
        f.reset(Some(fields(json!({ "item": "Notebook" }))));
        assert_eq!(f.value("item"), json!("Notebook"));
        assert!(f.is_dirty());
        f.reset(None);
        assert!(!f.is_dirty());
    }

    #[test]
    fn set_form_errors_replaces_map() {
        let f = form(FormConfig::new(Fields::new()));
        let mut errors = FieldErrors::new();
        errors.insert("item".into(), "Item já cadastrado".into());
        f.set_form_errors(errors.clone());
        assert_eq!(f.errors(), errors);
        assert!(!f.is_valid());
    }
}
