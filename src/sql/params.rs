//! Convert serde_json::Value to types that sqlx can bind, and typed rows back.

use crate::config::ValueType;
use crate::introspect::FieldDescriptor;
use crate::store::Record;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgRow, PgTypeInfo, Postgres};
use sqlx::{Database, Row};

/// A value bound as text. Every placeholder carries an explicit `::type` cast,
/// so PostgreSQL does the final conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Text(b.to_string()),
            Value::Number(n) => PgBindValue::Text(n.to_string()),
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Text(v.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<&str> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

/// Decode a row column by column using each field's declared type.
pub fn row_to_record(row: &PgRow, fields: &[FieldDescriptor]) -> Result<Record, sqlx::Error> {
    let mut map = Record::new();
    for f in fields {
        map.insert(f.name.clone(), cell_to_value(row, &f.name, &f.value_type)?);
    }
    Ok(map)
}

fn cell_to_value(row: &PgRow, name: &str, value_type: &ValueType) -> Result<Value, sqlx::Error> {
    Ok(match value_type {
        ValueType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        ValueType::Int32 => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
        ValueType::Int64 => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        ValueType::Float64 => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ValueType::String | ValueType::Enum(_) => {
            row.try_get::<Option<String>, _>(name)?.map(Value::String)
        }
        ValueType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ValueType::DateTime => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))),
        ValueType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string())),
        ValueType::Entity(_) | ValueType::List(_) => row.try_get::<Option<Value>, _>(name)?,
    }
    .unwrap_or(Value::Null))
}
