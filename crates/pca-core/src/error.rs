#![forbid(unsafe_code)]

//! Remote error classification.
//!
//! Backend failures arrive as a [`RawError`] carrying an optional code
//! (a PostgreSQL SQLSTATE, a PostgREST `PGRST*` code, a driver errno
//! name or an HTTP status) and a free-text message. This module reduces
//! them to a closed six-way [`ErrorCategory`] plus a pt-BR sentence fit
//! for direct display.
//!
//! # Classification order
//!
//! | Priority | Condition | Category |
//! |----------|-----------|----------|
//! | 1 | HTTP 5xx, `ECONNREFUSED`, `ENOTFOUND` | `Network` |
//! | 2 | `42501`, HTTP 401/403 | `Permission` |
//! | 3 | `PGRST116`, HTTP 404 | `NotFound` |
//! | 4 | SQLSTATE class `23` | `Validation` |
//! | 5 | SQLSTATE classes `22`, `42`, `08` | `Database` |
//! | 6 | anything else, or no code | `Unknown` |
//!
//! Messages come from a fixed code table first, then from keyword
//! heuristics on the raw text, then from a short raw message passed
//! through verbatim, and finally from a generic fallback sentence.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Code attached to a remote failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// HTTP-style numeric status.
    Status(u16),
    /// Textual code: SQLSTATE, `PGRST*`, errno name.
    Text(String),
}

impl ErrorCode {
    /// The numeric status, also recognizing three-digit textual codes
    /// such as `"503"`.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status(status) => Some(*status),
            Self::Text(text) if text.len() == 3 => text.parse().ok(),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Status(status) => Cow::Owned(status.to_string()),
            Self::Text(text) => Cow::Borrowed(text),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(status: u16) -> Self {
        Self::Status(status)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::Text(code.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::Text(code)
    }
}

/// Failure reported by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RawError {
    pub code: Option<ErrorCode>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl RawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_code(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// The six user-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Database,
    Validation,
    Permission,
    NotFound,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [Self; 6] = [
        Self::Network,
        Self::Database,
        Self::Validation,
        Self::Permission,
        Self::NotFound,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Database => "database",
            Self::Validation => "validation",
            Self::Permission => "permission",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }

    /// Icon shown next to the message in toasts.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Network => "⚠️",
            Self::Database => "💾",
            Self::Validation => "❌",
            Self::Permission => "🔒",
            Self::NotFound => "🔍",
            Self::Unknown => "🐛",
        }
    }

    /// Only transient transport failures are worth another attempt.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can report their category.
pub trait Classify {
    fn category(&self) -> ErrorCategory;
}

impl Classify for RawError {
    fn category(&self) -> ErrorCategory {
        classify(self)
    }
}

impl Classify for ErrorResult {
    fn category(&self) -> ErrorCategory {
        self.category
    }
}

/// Assign a category from the error's code.
#[must_use]
pub fn classify(error: &RawError) -> ErrorCategory {
    let Some(code) = &error.code else {
        return ErrorCategory::Unknown;
    };
    let status = code.http_status();
    let text = code.as_text();

    if status.is_some_and(|s| (500..600).contains(&s)) || text == "ECONNREFUSED" || text == "ENOTFOUND"
    {
        return ErrorCategory::Network;
    }
    if text == "42501" || matches!(status, Some(401 | 403)) {
        return ErrorCategory::Permission;
    }
    if text == "PGRST116" || status == Some(404) {
        return ErrorCategory::NotFound;
    }
    // SQLSTATE codes are five characters; the class is the first two.
    if status.is_none() {
        if text.starts_with("23") {
            return ErrorCategory::Validation;
        }
        if text.starts_with("22") || text.starts_with("42") || text.starts_with("08") {
            return ErrorCategory::Database;
        }
    }
    ErrorCategory::Unknown
}

fn known_code_message(code: &str) -> Option<&'static str> {
    let message = match code {
        "23505" => {
            "Já existe um registro com estes dados. Por favor, verifique se não está duplicado."
        }
        "23503" => {
            "Não é possível excluir este registro pois existem outros dados vinculados a ele."
        }
        "23502" => "Um campo obrigatório não foi preenchido.",
        "23514" => "Os dados fornecidos não atendem aos critérios de validação.",
        "42501" => "Você não tem permissão para realizar esta ação.",
        "42P01" => "A tabela solicitada não existe no banco de dados.",
        "22P02" => "Formato de dados inválido.",
        "22001" => "O texto fornecido é muito longo para este campo.",
        "08000" => "Erro de conexão com o banco de dados.",
        "08006" => "Conexão perdida com o banco de dados.",
        "57P03" => "O banco de dados está indisponível no momento.",
        "PGRST116" => "Nenhum resultado encontrado.",
        "PGRST204" => "Operação realizada, mas sem dados retornados.",
        "PGRST301" => "Múltiplos resultados encontrados quando apenas um era esperado.",
        _ => return None,
    };
    Some(message)
}

fn http_status_message(status: u16) -> Option<&'static str> {
    match status {
        500..=u16::MAX => Some(
            "O servidor está temporariamente indisponível. Tente novamente em alguns instantes.",
        ),
        404 => Some("O recurso solicitado não foi encontrado."),
        401 | 403 => Some("Você não tem permissão para acessar este recurso."),
        400 => Some("Os dados enviados são inválidos. Verifique e tente novamente."),
        _ => None,
    }
}

/// Longest raw message that may be shown to the user unchanged.
const PASSTHROUGH_MAX_LEN: usize = 200;

/// Sentence used when nothing better is known.
pub const FALLBACK_MESSAGE: &str = "Ocorreu um erro inesperado. Por favor, tente novamente.";

/// Produce the user-facing sentence for a raw error.
#[must_use]
pub fn translate(error: &RawError) -> Cow<'static, str> {
    if let Some(code) = &error.code {
        if let Some(message) = known_code_message(&code.as_text()) {
            return Cow::Borrowed(message);
        }
        if let Some(message) = code.http_status().and_then(http_status_message) {
            return Cow::Borrowed(message);
        }
    }

    let raw = error.message.as_str();
    if raw.is_empty() {
        return Cow::Borrowed(FALLBACK_MESSAGE);
    }
    let lowered = raw.to_lowercase();

    if lowered.contains("fetch") || lowered.contains("network") || lowered.contains("conexão") {
        return Cow::Borrowed(
            "Não foi possível conectar ao servidor. Verifique sua conexão com a internet.",
        );
    }
    if lowered.contains("timeout") {
        return Cow::Borrowed("A operação demorou muito e foi cancelada. Tente novamente.");
    }
    if lowered.contains("duplicat") {
        return Cow::Borrowed("Já existe um registro com estes dados.");
    }
    if lowered.contains("foreign key") || lowered.contains("fk_") {
        return Cow::Borrowed(
            "Não é possível excluir este registro pois existem outros dados vinculados a ele.",
        );
    }
    if raw.chars().count() < PASSTHROUGH_MAX_LEN && !raw.contains("PGRST") {
        return Cow::Owned(raw.to_string());
    }
    Cow::Borrowed(FALLBACK_MESSAGE)
}

/// Uniform failure handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResult {
    pub message: String,
    pub category: ErrorCategory,
    pub code: Option<ErrorCode>,
    pub icon: &'static str,
    /// The untouched backend error, only present in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<RawError>,
}

impl ErrorResult {
    /// A failure raised locally rather than by the remote store.
    pub fn local(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            code: None,
            icon: category.icon(),
            debug: None,
        }
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        self.category == ErrorCategory::Network
    }

    #[must_use]
    pub fn is_permission(&self) -> bool {
        self.category == ErrorCategory::Permission
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.category == ErrorCategory::Validation
    }
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon, self.message)
    }
}

impl std::error::Error for ErrorResult {}

/// Options for [`ErrorClassifier::handle_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleOptions<'a> {
    /// What was being attempted, e.g. `"criar demanda"`.
    pub context: &'a str,
    /// Attach the raw error to the result. `None` uses the classifier default.
    pub debug: Option<bool>,
}

/// Turns raw remote failures into [`ErrorResult`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassifier {
    debug: bool,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

impl ErrorClassifier {
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }

    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn classify(&self, error: &RawError) -> ErrorCategory {
        classify(error)
    }

    #[must_use]
    pub fn translate(&self, error: &RawError) -> Cow<'static, str> {
        translate(error)
    }

    /// Classify and translate with the default options.
    #[must_use]
    pub fn handle(&self, error: &RawError) -> ErrorResult {
        self.handle_with(error, HandleOptions::default())
    }

    #[must_use]
    pub fn handle_with(&self, error: &RawError, options: HandleOptions<'_>) -> ErrorResult {
        let category = classify(error);
        let message = translate(error).into_owned();
        let debug = options.debug.unwrap_or(self.debug);

        #[cfg(feature = "tracing")]
        {
            tracing::warn!(
                target: "pca.error",
                category = category.as_str(),
                code = ?error.code,
                context = options.context,
                "{message}"
            );
            if debug {
                tracing::debug!(target: "pca.error", raw = ?error, "raw backend error");
            }
        }

        ErrorResult {
            message,
            category,
            code: error.code.clone(),
            icon: category.icon(),
            debug: debug.then(|| error.clone()),
        }
    }
}
