//! Structured-output schema for workbook generation.
//!
//! Both the schema sent upstream and the validator in `generator` read their
//! required fields from `problem_fields`, so what the model is asked for and
//! what we accept cannot drift apart.

use serde_json::{json, Map, Value};

use crate::domain::{LevelScheme, Tier, MAX_NUMERIC_LEVEL, MIN_NUMERIC_LEVEL};

/// Top-level fields every workbook response must carry.
pub const WORKBOOK_FIELDS: [&str; 2] = ["topic", "problems"];

/// Required per-problem fields, in the order the model should emit them.
pub fn problem_fields(scheme: LevelScheme) -> &'static [&'static str] {
  match scheme {
    LevelScheme::Numeric => &["level", "title", "description", "question", "solution", "hint"],
    LevelScheme::Tiered => &["level", "question", "solution"],
  }
}

/// Which schema flavour the provider understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaDialect {
  /// Gemini `responseSchema` (OpenAPI subset, upper-case type names).
  Gemini,
  /// Strict JSON Schema as used by OpenAI `response_format.json_schema`.
  JsonSchema,
}

impl SchemaDialect {
  fn ty(self, name: &str) -> Value {
    match self {
      SchemaDialect::Gemini => Value::String(name.to_ascii_uppercase()),
      SchemaDialect::JsonSchema => Value::String(name.to_ascii_lowercase()),
    }
  }

  fn object(self, properties: Map<String, Value>, required: &[&str]) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), self.ty("object"));
    obj.insert("properties".into(), Value::Object(properties));
    obj.insert("required".into(), json!(required));
    match self {
      SchemaDialect::Gemini => {
        obj.insert("propertyOrdering".into(), json!(required));
      }
      SchemaDialect::JsonSchema => {
        obj.insert("additionalProperties".into(), Value::Bool(false));
      }
    }
    Value::Object(obj)
  }
}

fn level_schema(scheme: LevelScheme, dialect: SchemaDialect) -> Value {
  match scheme {
    LevelScheme::Numeric => json!({
      "type": dialect.ty("integer"),
      "minimum": MIN_NUMERIC_LEVEL,
      "maximum": MAX_NUMERIC_LEVEL,
    }),
    LevelScheme::Tiered => json!({
      "type": dialect.ty("string"),
      "enum": Tier::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
    }),
  }
}

/// Full response schema: `{ topic: string, problems: [problem] }`.
pub fn workbook_schema(scheme: LevelScheme, dialect: SchemaDialect, max_problems: usize) -> Value {
  let fields = problem_fields(scheme);
  let mut problem_props = Map::new();
  for field in fields {
    let prop = if *field == "level" {
      level_schema(scheme, dialect)
    } else {
      json!({ "type": dialect.ty("string") })
    };
    problem_props.insert((*field).to_string(), prop);
  }

  let mut top = Map::new();
  top.insert("topic".into(), json!({ "type": dialect.ty("string") }));
  top.insert(
    "problems".into(),
    json!({
      "type": dialect.ty("array"),
      "items": dialect.object(problem_props, fields),
      "minItems": 1,
      "maxItems": max_problems,
    }),
  );
  dialect.object(top, &WORKBOOK_FIELDS)
}
