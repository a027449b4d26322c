//! Builds parameterized DDL, SELECT, INSERT and UPDATE from an entity table.

use crate::case::to_snake_case;
use crate::config::{PkType, ValueType};
use crate::introspect::FieldDescriptor;
use crate::store::{EntityTable, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the manifest).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name for an entity.
pub fn qualified_table(schema: &str, entity: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(&to_snake_case(entity)))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// Storage type for a field's underlying type. Enums persist by name; nested
/// entities and collections as JSON.
pub fn column_type(value_type: &ValueType) -> &'static str {
    match value_type {
        ValueType::Bool => "boolean",
        ValueType::Int32 => "integer",
        ValueType::Int64 => "bigint",
        ValueType::Float64 => "double precision",
        ValueType::String | ValueType::Enum(_) => "text",
        ValueType::Date => "date",
        ValueType::DateTime => "timestamptz",
        ValueType::Uuid => "uuid",
        ValueType::Entity(_) | ValueType::List(_) => "jsonb",
    }
}

fn identifier_column(pk_type: &PkType) -> &'static str {
    match pk_type {
        PkType::BigInt => "BIGSERIAL PRIMARY KEY",
        PkType::Int => "SERIAL PRIMARY KEY",
        PkType::Uuid => "UUID PRIMARY KEY DEFAULT gen_random_uuid()",
        PkType::Text => "TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text",
    }
}

fn placeholder(q: &mut QueryBuf, field: &FieldDescriptor, v: Value) -> String {
    let n = q.push_param(v);
    format!("${}::{}", n, column_type(&field.value_type))
}

fn select_column_list(table: &EntityTable) -> String {
    table
        .fields
        .iter()
        .map(|f| quoted(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table(schema: &str, table: &EntityTable) -> String {
    let cols: Vec<String> = table
        .fields
        .iter()
        .map(|f| {
            if f.name == table.identifier {
                format!("{} {}", quoted(&f.name), identifier_column(&table.pk_type))
            } else {
                let null = if f.nullable { "NULL" } else { "NOT NULL" };
                format!("{} {} {}", quoted(&f.name), column_type(&f.value_type), null)
            }
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_table(schema, &table.name),
        cols.join(", ")
    )
}

/// Whole collection, unfiltered.
pub fn select_all(schema: &str, table: &EntityTable) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {}",
        select_column_list(table),
        qualified_table(schema, &table.name)
    );
    q
}

pub fn select_by_id(schema: &str, table: &EntityTable, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = table
        .field(&table.identifier)
        .map(|f| column_type(&f.value_type))
        .unwrap_or("text");
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}::{}",
        select_column_list(table),
        qualified_table(schema, &table.name),
        quoted(&table.identifier),
        n,
        pk
    );
    q
}

/// INSERT every column; the identifier is left to its default when null.
pub fn insert(schema: &str, table: &EntityTable, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &table.fields {
        let v = record.get(&f.name).cloned().unwrap_or(Value::Null);
        if f.name == table.identifier && v.is_null() {
            continue;
        }
        cols.push(quoted(&f.name));
        placeholders.push(placeholder(&mut q, f, v));
    }
    let target = qualified_table(schema, &table.name);
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE every non-identifier column of the row with identifier `id`.
pub fn update(schema: &str, table: &EntityTable, id: &Value, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    let mut pk_field = None;
    for f in &table.fields {
        if f.name == table.identifier {
            pk_field = Some(f);
            continue;
        }
        let v = record.get(&f.name).cloned().unwrap_or(Value::Null);
        let ph = placeholder(&mut q, f, v);
        sets.push(format!("{} = {}", quoted(&f.name), ph));
    }
    let target = qualified_table(schema, &table.name);
    let returning = select_column_list(table);
    let id_ph = match pk_field {
        Some(f) => placeholder(&mut q, f, id.clone()),
        None => format!("${}", q.push_param(id.clone())),
    };
    q.sql = if sets.is_empty() {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            returning,
            target,
            quoted(&table.identifier),
            id_ph
        )
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            target,
            sets.join(", "),
            quoted(&table.identifier),
            id_ph,
            returning
        )
    };
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseDefinition, EntityRegistry, FieldAccess, FieldDefinition};
    use crate::introspect::describe_field;
    use std::collections::HashMap;

    fn def(name: &str, value_type: ValueType, wrapped: bool) -> FieldDefinition {
        FieldDefinition {
            name: name.into(),
            value_type,
            wrapped,
            annotated_nullable: false,
            access: FieldAccess::ReadWrite,
            tags: Vec::new(),
            validation: None,
        }
    }

    fn other_thing() -> EntityTable {
        let id = def("id", ValueType::Int64, false);
        let base = BaseDefinition {
            name: "EntityBase".into(),
            identifier: "id".into(),
            pk_type: PkType::BigInt,
            fields: vec![id.clone()],
        };
        let registry = EntityRegistry::new(base.clone(), HashMap::new(), Vec::new());
        let fields = vec![
            describe_field(&id),
            describe_field(&def("creation_date", ValueType::Date, false)),
            describe_field(&def("rank", ValueType::Int32, true)),
        ];
        EntityTable::new("OtherThing", &base, fields, &registry)
    }

    #[test]
    fn create_table_maps_types_and_nullability() {
        let sql = create_table("public", &other_thing());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"public\".\"other_thing\" (\"id\" BIGSERIAL PRIMARY KEY, \
             \"creation_date\" date NOT NULL, \"rank\" integer NULL)"
        );
    }

    #[test]
    fn insert_skips_null_identifier() {
        let t = other_thing();
        let mut record = t.defaults.clone();
        record.insert("creation_date".into(), Value::from("2024-01-02"));
        let q = insert("public", &t, &record);
        assert!(q.sql.starts_with("INSERT INTO \"public\".\"other_thing\" (\"creation_date\", \"rank\")"));
        assert!(q.sql.contains("VALUES ($1::date, $2::integer)"));
        assert_eq!(q.params, vec![Value::from("2024-01-02"), Value::Null]);
    }

    #[test]
    fn update_binds_identifier_last() {
        let t = other_thing();
        let q = update("public", &t, &Value::from(7), &t.defaults);
        assert!(q.sql.contains("WHERE \"id\" = $3::bigint RETURNING"));
        assert_eq!(q.params.last(), Some(&Value::from(7)));
    }
}
