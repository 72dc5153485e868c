#![forbid(unsafe_code)]

//! Identity and field access for remote records.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::Fields;

/// Field lookup by name.
///
/// Tables sort and filter through this trait, validators read form values
/// through it, and reports aggregate over it. Unknown fields yield
/// [`Value::Null`].
pub trait Record {
    fn field(&self, name: &str) -> Value;
}

/// A record with a stable identity key assigned by the remote store.
pub trait Entity: Record + Clone + PartialEq + Debug + 'static {
    fn id(&self) -> &str;
}

impl Record for Fields {
    fn field(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }
}

impl Record for Value {
    fn field(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }
}

/// Schemaless entity: an id plus whatever fields the store returned.
///
/// Serializes as a flat JSON object with `id` next to the other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

impl Record for Document {
    fn field(&self, name: &str) -> Value {
        if name == "id" {
            return Value::String(self.id.clone());
        }
        self.fields.field(name)
    }
}

impl Entity for Document {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_round_trips_flat() {
        let doc: Document = serde_json::from_value(json!({"id": "u1", "nome": "Saúde"})).unwrap();
        assert_eq!(doc.id(), "u1");
        assert_eq!(doc.field("nome"), json!("Saúde"));
        assert_eq!(doc.field("id"), json!("u1"));
        assert_eq!(doc.field("missing"), Value::Null);
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"id": "u1", "nome": "Saúde"})
        );
    }
}
