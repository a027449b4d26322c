//! Case conversion for the API: response keys snake_case -> camelCase, request
//! keys camelCase -> declared field names. Also names storage tables.

use serde_json::{Map, Value};

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "creation_date" -> "creationDate"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase (or PascalCase) to snake_case.
/// e.g. "creationDate" -> "creation_date", "OtherThing" -> "other_thing"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert all keys of a JSON object from snake_case to camelCase (in place).
pub fn object_keys_to_camel_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let camel = to_camel_case(&k);
        if camel != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(camel, v);
            }
        }
    }
}

/// Recursively apply camelCase to all object keys in a Value (objects and arrays of objects).
pub fn value_keys_to_camel_case_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            object_keys_to_camel_case(map);
            for (_, v) in map.iter_mut() {
                value_keys_to_camel_case_recursive(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                value_keys_to_camel_case_recursive(v);
            }
        }
        _ => {}
    }
}

/// Map a request key onto a declared field name: exact match first, then its
/// snake_case form. Unknown keys come back unchanged.
pub fn declared_key(key: &str, declared: impl Fn(&str) -> bool) -> String {
    if declared(key) {
        return key.to_string();
    }
    let snake = to_snake_case(key);
    if declared(&snake) {
        snake
    } else {
        key.to_string()
    }
}

/// Rename the top-level keys of a request object onto declared field names.
pub fn object_keys_to_declared(obj: Map<String, Value>, declared: impl Fn(&str) -> bool) -> Map<String, Value> {
    obj.into_iter()
        .map(|(k, v)| (declared_key(&k, &declared), v))
        .collect()
}
