//! Manifest validation: naming, references and inheritance consistency.

use crate::config::{ModelConfig, ValueType};
use crate::error::SynthesisError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &ModelConfig) -> Result<(), SynthesisError> {
    let base = &config.base;
    if !base.fields.iter().any(|f| f.name == base.identifier) {
        return Err(SynthesisError::MissingIdentifier {
            base: base.name.clone(),
            field: base.identifier.clone(),
        });
    }
    check_unique_fields(&base.name, base.fields.iter().map(|f| f.name.as_str()))?;

    let mut type_names: HashSet<&str> = HashSet::new();
    type_names.insert(base.name.as_str());
    for e in &config.enums {
        if e.values.is_empty() {
            return Err(SynthesisError::Introspection(format!(
                "enum '{}' declares no values",
                e.name
            )));
        }
        if ValueType::builtin(&e.name).is_some() || !type_names.insert(e.name.as_str()) {
            return Err(SynthesisError::Duplicate {
                kind: "type",
                name: e.name.clone(),
            });
        }
    }
    for ent in &config.entities {
        if ValueType::builtin(&ent.name).is_some() || !type_names.insert(ent.name.as_str()) {
            return Err(SynthesisError::Duplicate {
                kind: "type",
                name: ent.name.clone(),
            });
        }
    }

    let parents: HashMap<&str, &str> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.extends.as_deref().unwrap_or(&base.name)))
        .collect();

    for ent in &config.entities {
        check_unique_fields(&ent.name, ent.fields.iter().map(|f| f.name.as_str()))?;
        for f in &ent.fields {
            if base.fields.iter().any(|b| b.name == f.name) {
                return Err(SynthesisError::Duplicate {
                    kind: "field",
                    name: format!("{}.{} (declared on {})", ent.name, f.name, base.name),
                });
            }
        }

        let mut seen = HashSet::new();
        let mut current = ent.name.as_str();
        while current != base.name {
            if !seen.insert(current) {
                return Err(SynthesisError::Cycle(ent.name.clone()));
            }
            // a chain that leaves the manifest is not an error; resolve skips it
            current = match parents.get(current) {
                Some(parent) => parent,
                None => break,
            };
        }
    }

    Ok(())
}

fn check_unique_fields<'a>(
    owner: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), SynthesisError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SynthesisError::Duplicate {
                kind: "field",
                name: format!("{}.{}", owner, name),
            });
        }
    }
    Ok(())
}
