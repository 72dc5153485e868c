#![forbid(unsafe_code)]

//! Procurement plan domain records.
//!
//! Three resource kinds exist on the remote side:
//!
//! | Type | Table | Identity |
//! |------|-------|----------|
//! | [`UnidadeGestora`] | `unidades_gestoras` | uuid |
//! | [`Demanda`] | `demandas` | uuid, joined with its unit |
//! | [`Pca`] | `pca` | uuid, one row per year |

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::format::parse_date;
use crate::record::{Entity, Record};
use crate::store::ResourceStatus;

/// Calendar quarter a demand is expected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        match date.month0() / 3 {
            0 => Self::Q1,
            1 => Self::Q2,
            2 => Self::Q3,
            _ => Self::Q4,
        }
    }

    /// Quarter of a `YYYY-MM-DD` (or RFC 3339) string.
    #[must_use]
    pub fn of_str(date: &str) -> Option<Self> {
        parse_date(date).map(Self::of)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandaStatus {
    #[default]
    Pendente,
    EmAnalise,
    Aprovada,
    Rejeitada,
}

impl DemandaStatus {
    pub const ALL: [Self; 4] = [Self::Pendente, Self::EmAnalise, Self::Aprovada, Self::Rejeitada];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pendente => "pendente",
            Self::EmAnalise => "em_analise",
            Self::Aprovada => "aprovada",
            Self::Rejeitada => "rejeitada",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pendente => "Pendente",
            Self::EmAnalise => "Em Análise",
            Self::Aprovada => "Aprovada",
            Self::Rejeitada => "Rejeitada",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Pendente => "⏳",
            Self::EmAnalise => "🔍",
            Self::Aprovada => "✅",
            Self::Rejeitada => "❌",
        }
    }
}

/// Lifecycle of the yearly plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaStatus {
    #[default]
    Rascunho,
    EmAnalise,
    Aprovado,
    Publicado,
}

impl PcaStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rascunho => "rascunho",
            Self::EmAnalise => "em_analise",
            Self::Aprovado => "aprovado",
            Self::Publicado => "publicado",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rascunho => "Rascunho",
            Self::EmAnalise => "Em Análise",
            Self::Aprovado => "Aprovado",
            Self::Publicado => "Publicado",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Rascunho => "📝",
            Self::EmAnalise => "🔍",
            Self::Aprovado => "✅",
            Self::Publicado => "📢",
        }
    }
}

impl ResourceStatus for PcaStatus {
    fn stamps_completion(&self) -> bool {
        matches!(self, Self::Publicado)
    }
}

/// Demand priority, 1 (critical) through 5 (minimal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prioridade(u8);

impl Prioridade {
    pub const CRITICA: Self = Self(1);
    pub const MEDIA: Self = Self(3);
    pub const MINIMA: Self = Self(5);

    /// Clamp into `1..=5`.
    #[must_use]
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 5))
    }

    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            1 => "Crítica",
            2 => "Alta",
            3 => "Média",
            4 => "Baixa",
            _ => "Mínima",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self.0 {
            1 => "🔴",
            2 => "🟠",
            3 => "🟡",
            4 => "🟢",
            _ => "⚪",
        }
    }
}

impl Default for Prioridade {
    fn default() -> Self {
        Self::MEDIA
    }
}

impl Serialize for Prioridade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Prioridade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Number inputs hand over floats (`3.0`) and sometimes strings.
        let raw = Value::deserialize(deserializer)?;
        let level = crate::value::as_number(&raw)
            .filter(|n| n.fract() == 0.0 && (1.0..=5.0).contains(n))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid priority: {raw}")))?;
        Ok(Self(level as u8))
    }
}

mod opt_date {
    //! `Option<NaiveDate>` that tolerates null, `""` and full timestamps.

    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => crate::format::parse_date(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
            other => Err(serde::de::Error::custom(format!("invalid date: {other}"))),
        }
    }
}

fn date_value(date: Option<NaiveDate>) -> Value {
    date.map_or(Value::Null, |d| json!(d.format("%Y-%m-%d").to_string()))
}

fn timestamp_value(ts: Option<DateTime<Utc>>) -> Value {
    ts.map_or(Value::Null, |t| json!(t.to_rfc3339()))
}

/// Organizational unit that submits demands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnidadeGestora {
    pub id: String,
    pub nome: String,
    pub sigla: String,
    #[serde(default)]
    pub responsavel: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for UnidadeGestora {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => json!(self.id),
            "nome" => json!(self.nome),
            "sigla" => json!(self.sigla),
            "responsavel" => json!(self.responsavel),
            "email" => json!(self.email),
            "created_at" => timestamp_value(self.created_at),
            _ => Value::Null,
        }
    }
}

impl Entity for UnidadeGestora {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The unit summary joined onto each demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnidadeRef {
    pub id: String,
    pub nome: String,
    pub sigla: String,
}

/// A procurement request submitted by a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demanda {
    pub id: String,
    pub unidade_id: String,
    #[serde(default)]
    pub unidade: Option<UnidadeRef>,
    pub item: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub justificativa: String,
    pub quantidade: f64,
    pub valor_unitario: f64,
    /// Computed by the store as `quantidade × valor_unitario`.
    #[serde(default)]
    pub valor_total: f64,
    #[serde(default, with = "opt_date")]
    pub data_prevista: Option<NaiveDate>,
    #[serde(default)]
    pub trimestre: Option<Quarter>,
    #[serde(default)]
    pub status: DemandaStatus,
    #[serde(default)]
    pub prioridade: Prioridade,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Demanda {
    /// Name of the owning unit, if the join was loaded.
    #[must_use]
    pub fn unidade_nome(&self) -> Option<&str> {
        self.unidade.as_ref().map(|u| u.nome.as_str())
    }
}

impl Record for Demanda {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => json!(self.id),
            "unidade_id" => json!(self.unidade_id),
            "unidade.nome" => self.unidade_nome().map_or(Value::Null, |n| json!(n)),
            "unidade.sigla" => self
                .unidade
                .as_ref()
                .map_or(Value::Null, |u| json!(u.sigla)),
            "item" => json!(self.item),
            "descricao" => json!(self.descricao),
            "justificativa" => json!(self.justificativa),
            "quantidade" => json!(self.quantidade),
            "valor_unitario" => json!(self.valor_unitario),
            "valor_total" => json!(self.valor_total),
            "data_prevista" => date_value(self.data_prevista),
            "trimestre" => self.trimestre.map_or(Value::Null, |q| json!(q.as_str())),
            "status" => json!(self.status.as_str()),
            "prioridade" => json!(self.prioridade.level()),
            "created_at" => timestamp_value(self.created_at),
            "updated_at" => timestamp_value(self.updated_at),
            _ => Value::Null,
        }
    }
}

impl Entity for Demanda {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The annual procurement plan (Plano de Contratações Anual).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub id: String,
    pub ano: i32,
    pub titulo: String,
    #[serde(default)]
    pub valor_total: f64,
    #[serde(default)]
    pub status: PcaStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Record for Pca {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => json!(self.id),
            "ano" => json!(self.ano),
            "titulo" => json!(self.titulo),
            "valor_total" => json!(self.valor_total),
            "status" => json!(self.status.as_str()),
            "created_at" => timestamp_value(self.created_at),
            "published_at" => timestamp_value(self.published_at),
            _ => Value::Null,
        }
    }
}

impl Entity for Pca {
    fn id(&self) -> &str {
        &self.id
    }
}
