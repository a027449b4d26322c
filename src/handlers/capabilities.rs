//! Serving-layer interpretation of capability tags: filtering, sorting, paging,
//! projection and single-result coercion over the collection an operation returns.

use crate::case::declared_key;
use crate::config::ValueType;
use crate::error::AppError;
use crate::response::PageMeta;
use crate::store::{EntityTable, Record};
use crate::synth::CapabilitySet;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Query-string prefix for exact-match filters, e.g. `where.name=Thing 1`.
pub const FILTER_PREFIX: &str = "where.";

/// Query-string arguments, already mapped onto declared field names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryArgs {
    pub id: Option<Value>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
    pub filters: Vec<(String, Value)>,
    /// (field, descending)
    pub order_by: Vec<(String, bool)>,
    pub select: Option<Vec<String>>,
}

impl QueryArgs {
    /// Recognized keys: `id`, `skip`, `take`, `orderBy` (`field` or
    /// `field:desc`, comma separated), `select` (comma separated), `isNull`
    /// (comma separated fields that must be null) and `where.<field>` for an
    /// exact-match filter on a readable field. Filter values are taken
    /// literally for text-like fields.
    pub fn parse(params: &HashMap<String, String>, table: &EntityTable) -> Result<Self, AppError> {
        let mut args = QueryArgs::default();
        let field = |k: &str| -> Result<String, AppError> {
            let name = declared_key(k, |n| table.field(n).is_some_and(|f| f.readable));
            if table.field(&name).is_some_and(|f| f.readable) {
                Ok(name)
            } else {
                Err(AppError::BadRequest(format!("unknown field {} on {}", k, table.name)))
            }
        };
        let list = |v: &str| -> Result<Vec<String>, AppError> {
            v.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|n| field(n))
                .collect()
        };

        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for k in keys {
            let v = &params[k];
            match k.as_str() {
                "id" => args.id = Some(Value::String(v.clone())),
                "skip" => args.skip = Some(parse_u32(k, v)?),
                "take" => args.take = Some(parse_u32(k, v)?),
                "orderBy" | "order_by" => {
                    for part in v.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                        let (name, desc) = match part.split_once(':') {
                            Some((n, dir)) if dir.eq_ignore_ascii_case("desc") => (n, true),
                            Some((n, dir)) if dir.eq_ignore_ascii_case("asc") => (n, false),
                            Some(_) => {
                                return Err(AppError::BadRequest(format!("invalid sort direction in {}", part)))
                            }
                            None => (part, false),
                        };
                        args.order_by.push((field(name)?, desc));
                    }
                }
                "select" => args.select = Some(list(v)?),
                "isNull" | "is_null" => {
                    for name in list(v)? {
                        args.filters.push((name, Value::Null));
                    }
                }
                _ => {
                    let Some(raw) = k.strip_prefix(FILTER_PREFIX) else {
                        return Err(AppError::BadRequest(format!("unknown query parameter {}", k)));
                    };
                    let name = field(raw)?;
                    let value_type = table
                        .field(&name)
                        .map(|f| f.value_type.clone())
                        .unwrap_or(ValueType::String);
                    args.filters.push((name.clone(), filter_value(&name, &value_type, v)?));
                }
            }
        }
        Ok(args)
    }

    fn uses_paging(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }
}

fn parse_u32(key: &str, v: &str) -> Result<u32, AppError> {
    v.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

/// Coerce a query-string value to the field's JSON representation.
fn filter_value(name: &str, value_type: &ValueType, s: &str) -> Result<Value, AppError> {
    let invalid = || AppError::BadRequest(format!("invalid filter value for {}: {}", name, s));
    match value_type {
        ValueType::Int32 | ValueType::Int64 => s.parse::<i64>().map(Value::from).map_err(|_| invalid()),
        ValueType::Float64 => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        ValueType::Bool => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ValueType::Uuid => uuid::Uuid::parse_str(s)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| invalid()),
        ValueType::String | ValueType::Date | ValueType::DateTime | ValueType::Enum(_) => {
            Ok(Value::String(s.to_string()))
        }
        ValueType::Entity(_) | ValueType::List(_) => Err(AppError::BadRequest(format!(
            "{} holds nested values and cannot be filtered",
            name
        ))),
    }
}

/// Result of applying capabilities to a collection.
#[derive(Debug, PartialEq)]
pub enum Shaped {
    Page { items: Vec<Record>, meta: PageMeta },
    One(Record),
}

/// Apply the operation's capability tags to `records`. Using a capability the
/// operation does not carry is a bad request.
pub fn apply_capabilities(
    caps: &CapabilitySet,
    table: &EntityTable,
    mut records: Vec<Record>,
    args: &QueryArgs,
) -> Result<Shaped, AppError> {
    if !args.filters.is_empty() && !caps.filtering {
        return Err(AppError::BadRequest("filtering is not supported here".into()));
    }
    if !args.order_by.is_empty() && !caps.sorting {
        return Err(AppError::BadRequest("sorting is not supported here".into()));
    }
    if args.select.is_some() && !caps.projection {
        return Err(AppError::BadRequest("projection is not supported here".into()));
    }
    if args.uses_paging() && caps.paging.is_none() {
        return Err(AppError::BadRequest("paging is not supported here".into()));
    }

    records.retain(|r| {
        args.filters
            .iter()
            .all(|(name, v)| value_eq(r.get(name).unwrap_or(&Value::Null), v))
    });

    if !args.order_by.is_empty() {
        records.sort_by(|a, b| {
            args.order_by
                .iter()
                .map(|(name, desc)| {
                    let ord = compare_values(a.get(name), b.get(name));
                    if *desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    if caps.single_result {
        let record = match records.len() {
            0 => return Err(AppError::NotFound(table.name.clone())),
            1 => records.remove(0),
            n => return Err(AppError::Ambiguous(format!("{} {} records matched", n, table.name))),
        };
        return Ok(Shaped::One(project(table, record, args.select.as_deref())));
    }

    let mut meta = PageMeta::default();
    if let Some(paging) = &caps.paging {
        let total = records.len();
        let skip = args.skip.unwrap_or(0);
        let take = args
            .take
            .unwrap_or(paging.default_page_size)
            .min(paging.max_page_size);
        records = records
            .into_iter()
            .skip(skip as usize)
            .take(take as usize)
            .collect();
        meta.skip = Some(skip);
        meta.take = Some(take);
        meta.has_next_page = Some((skip as usize).saturating_add(take as usize) < total);
        if paging.include_total_count {
            meta.total_count = Some(total as u64);
        }
    }

    let items = records
        .into_iter()
        .map(|r| project(table, r, args.select.as_deref()))
        .collect();
    Ok(Shaped::Page { items, meta })
}

/// Drop fields that are not readable outside the entity, then apply `select`.
pub fn project(table: &EntityTable, mut record: Record, select: Option<&[String]>) -> Record {
    record.retain(|k, _| {
        table.field(k).map_or(true, |f| f.readable) && select.map_or(true, |s| s.iter().any(|n| n == k))
    });
    record
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

/// Nulls first, then by natural order within a JSON kind.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
