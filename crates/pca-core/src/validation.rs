#![forbid(unsafe_code)]

//! Composable field validation rules.
//!
//! A [`Rule`] looks at one value and the field's display label and either
//! passes (`None`) or returns a pt-BR message. Rules for a field run in
//! order and the first failure wins; later rules for that field are not
//! evaluated.
//!
//! ```
//! use pca_core::validation::{ValidationRules, positive, required, validate_form};
//! use serde_json::json;
//!
//! let rules = ValidationRules::new()
//!     .field("quantidade", [required(), positive()])
//!     .label("quantidade", "Quantidade");
//! let values = json!({"quantidade": 0}).as_object().cloned().unwrap();
//! let errors = validate_form(&values, &rules);
//! assert_eq!(errors["quantidade"], "Quantidade deve ser maior que zero");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{Local, NaiveDate};
use regex_lite::Regex;
use serde_json::Value;

use crate::format::{format_number_pt_br, parse_date};
use crate::record::Record;
use crate::value::{as_number, display_text, is_falsy};

/// Field name → error message. A field without an entry has no error.
pub type FieldErrors = BTreeMap<String, String>;

type Check = dyn Fn(&Value, &str) -> Option<String> + Send + Sync;

/// A single validator.
#[derive(Clone)]
pub struct Rule {
    name: &'static str,
    check: Arc<Check>,
}

impl Rule {
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&Value, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    /// A rule with a caller-supplied check.
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Value, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self::new("custom", check)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the rule. `None` means the value passes.
    #[must_use]
    pub fn check(&self, value: &Value, label: &str) -> Option<String> {
        (self.check)(value, label)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

/// Fails on null, the empty string and whitespace-only strings.
#[must_use]
pub fn required() -> Rule {
    Rule::new("required", |value, label| match value {
        Value::Null => Some(format!("{label} é obrigatório")),
        Value::String(s) if s.is_empty() => Some(format!("{label} é obrigatório")),
        Value::String(s) if s.trim().is_empty() => Some(format!("{label} não pode estar vazio")),
        _ => None,
    })
}

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Same shape as `EMAIL`, used if the pattern fails to build.
fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    let well_formed =
        |part: &str| !part.is_empty() && !part.contains('@') && !part.contains(char::is_whitespace);
    well_formed(local)
        && domain
            .rsplit_once('.')
            .is_some_and(|(host, tld)| well_formed(host) && well_formed(tld))
}

fn is_email(text: &str) -> bool {
    match EMAIL.as_ref() {
        Some(re) => re.is_match(text),
        None => looks_like_email(text),
    }
}

/// Fails when a non-empty value is not `local@domain.tld`.
#[must_use]
pub fn email() -> Rule {
    Rule::new("email", |value, _| {
        if is_falsy(value) {
            return None;
        }
        (!is_email(display_text(value).trim())).then(|| "E-mail inválido".to_string())
    })
}

/// Trimmed text must be at least `min` characters. Empty values pass.
#[must_use]
pub fn min_len(min: usize) -> Rule {
    Rule::new("min_len", move |value, label| {
        if is_falsy(value) {
            return None;
        }
        let len = display_text(value).trim().chars().count();
        let plural = if min > 1 { "s" } else { "" };
        (len < min).then(|| format!("{label} deve ter pelo menos {min} caractere{plural}"))
    })
}

/// Trimmed text must be at most `max` characters. Empty values pass.
#[must_use]
pub fn max_len(max: usize) -> Rule {
    Rule::new("max_len", move |value, label| {
        if is_falsy(value) {
            return None;
        }
        let len = display_text(value).trim().chars().count();
        (len > max).then(|| format!("{label} deve ter no máximo {max} caracteres"))
    })
}

/// Must be a number greater than zero.
#[must_use]
pub fn positive() -> Rule {
    Rule::new("positive", |value, label| match as_number(value) {
        None => Some(format!("{label} deve ser um número válido")),
        Some(n) if n <= 0.0 => Some(format!("{label} deve ser maior que zero")),
        Some(_) => None,
    })
}

/// Must be a number, zero allowed.
#[must_use]
pub fn non_negative() -> Rule {
    Rule::new("non_negative", |value, label| match as_number(value) {
        None => Some(format!("{label} deve ser um número válido")),
        Some(n) if n < 0.0 => Some(format!("{label} não pode ser negativo")),
        Some(_) => None,
    })
}

/// Numbers above `max` fail. Non-numeric values pass.
#[must_use]
pub fn max_value(max: f64) -> Rule {
    Rule::new("max_value", move |value, label| {
        let n = as_number(value)?;
        (n > max).then(|| format!("{label} não pode exceder {}", format_number_pt_br(max)))
    })
}

/// Brazilian phone number: 10 or 11 digits once punctuation is stripped.
#[must_use]
pub fn phone() -> Rule {
    Rule::new("phone", |value, _| {
        if is_falsy(value) {
            return None;
        }
        let digits = display_text(value).chars().filter(char::is_ascii_digit).count();
        (!(10..=11).contains(&digits))
            .then(|| "Telefone inválido (use formato: (99) 99999-9999)".to_string())
    })
}

/// The date must not be before today in local time. Empty and unreadable
/// values pass.
#[must_use]
pub fn not_past_date() -> Rule {
    Rule::new("not_past_date", |value, label| {
        check_not_past(value, label, Local::now().date_naive())
    })
}

/// [`not_past_date`] against a fixed `today`.
#[must_use]
pub fn not_past_date_at(today: NaiveDate) -> Rule {
    Rule::new("not_past_date", move |value, label| {
        check_not_past(value, label, today)
    })
}

fn check_not_past(value: &Value, label: &str, today: NaiveDate) -> Option<String> {
    let Value::String(s) = value else {
        return None;
    };
    let date = parse_date(s)?;
    (date < today).then(|| format!("{label} não pode ser no passado"))
}

#[derive(Debug, Clone, Default)]
struct FieldRules {
    label: Option<String>,
    rules: Vec<Rule>,
}

/// Ordered rule lists per field, plus optional display labels.
///
/// Without a label a field's own name is used in messages.
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    fields: BTreeMap<String, FieldRules>,
}

impl ValidationRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rules for `name`.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields
            .entry(name.into())
            .or_default()
            .rules
            .extend(rules);
        self
    }

    #[must_use]
    pub fn label(mut self, name: impl Into<String>, label: impl Into<String>) -> Self {
        self.fields.entry(name.into()).or_default().label = Some(label.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|f| f.rules.is_empty())
    }

    /// Names of the fields that carry at least one rule.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.rules.is_empty())
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn label_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.fields
            .get(name)
            .and_then(|f| f.label.as_deref())
            .unwrap_or(name)
    }

    /// First failing rule's message for one field. An empty message does
    /// not count as a failure; the next rule runs instead.
    #[must_use]
    pub fn validate_field(&self, name: &str, value: &Value) -> Option<String> {
        let field = self.fields.get(name)?;
        let label = field.label.as_deref().unwrap_or(name);
        field
            .rules
            .iter()
            .find_map(|rule| rule.check(value, label).filter(|m| !m.is_empty()))
    }
}

/// Validate every field that has rules. Only failing fields appear in the
/// result.
#[must_use]
pub fn validate_form<R: Record + ?Sized>(values: &R, rules: &ValidationRules) -> FieldErrors {
    rules
        .field_names()
        .filter_map(|name| {
            rules
                .validate_field(name, &values.field(name))
                .map(|message| (name.to_string(), message))
        })
        .collect()
}

#[must_use]
pub fn has_errors(errors: &FieldErrors) -> bool {
    !errors.is_empty()
}

/// Copy of `errors` without `field`.
#[must_use]
pub fn clear_error(errors: &FieldErrors, field: &str) -> FieldErrors {
    let mut rest = errors.clone();
    rest.remove(field);
    rest
}
