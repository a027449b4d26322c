//! Schema synthesis: derives input shapes and Query/Mutation operation
//! descriptors from the entity registry, once, at startup. The resulting
//! [`ApiSchema`] is immutable and dispatches invocations to the generic CRUD
//! implementations.

pub mod operation;
pub mod shape;

pub use operation::*;
pub use shape::*;

use crate::config::EntityRegistry;
use crate::error::{AppError, SynthesisError};
use crate::introspect::{describe, describe_all, describe_base};
use crate::service::CrudService;
use crate::store::{EntityTable, Record, Session};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
pub struct SynthesisOptions {
    pub paging: PagingOptions,
}

/// Decoded input argument for a mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Create(CreateInput),
    Update(UpdateInput),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    pub id: Option<Value>,
    pub input: Option<Input>,
}

impl Arguments {
    pub fn none() -> Self {
        Arguments::default()
    }

    pub fn id(id: impl Into<Value>) -> Self {
        Arguments {
            id: Some(id.into()),
            input: None,
        }
    }

    pub fn create(input: CreateInput) -> Self {
        Arguments {
            id: None,
            input: Some(Input::Create(input)),
        }
    }

    pub fn update(id: impl Into<Value>, input: UpdateInput) -> Self {
        Arguments {
            id: Some(id.into()),
            input: Some(Input::Update(input)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Collection(Vec<Record>),
    Entity(Record),
}

impl Output {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Output::Collection(rows) => rows,
            Output::Entity(row) => vec![row],
        }
    }
}

#[derive(Debug)]
pub struct ApiSchema {
    registry: EntityRegistry,
    query: Container,
    mutation: Container,
    shapes: Vec<Shape>,
    shape_index: HashMap<String, usize>,
    tables: HashMap<String, Arc<EntityTable>>,
}

/// Serializable view of the synthesized surface.
#[derive(Serialize)]
pub struct SchemaDocument<'a> {
    pub query: &'a Container,
    pub mutation: &'a Container,
    pub shapes: &'a [Shape],
    pub entities: Vec<&'a EntityTable>,
}

impl ApiSchema {
    pub fn synthesize(registry: EntityRegistry, options: SynthesisOptions) -> Result<Self, SynthesisError> {
        let base = &registry.base;
        let identifier = describe_base(base)
            .into_iter()
            .find(|d| d.name == base.identifier)
            .ok_or_else(|| SynthesisError::MissingIdentifier {
                base: base.name.clone(),
                field: base.identifier.clone(),
            })?;
        if identifier.value_type != base.pk_type.value_type() || identifier.nullable {
            return Err(SynthesisError::UnsupportedIdentifier {
                field: identifier.name.clone(),
                type_name: identifier.value_type.to_string(),
            });
        }

        // every synthesized name shares one namespace with the declared types
        let mut owners: HashMap<String, String> = HashMap::new();
        claim(&mut owners, ContainerKind::Query.name(), "Query container")?;
        claim(&mut owners, ContainerKind::Mutation.name(), "Mutation container")?;
        claim(&mut owners, &base.name, &format!("base {}", base.name))?;
        let mut enum_names: Vec<&String> = registry.enums.keys().collect();
        enum_names.sort();
        for name in enum_names {
            claim(&mut owners, name, &format!("enum {}", name))?;
        }
        for e in registry.enumerate() {
            claim(&mut owners, &e.name, &format!("entity {}", e.name))?;
        }

        let mut query = Container::new(ContainerKind::Query);
        let mut mutation = Container::new(ContainerKind::Mutation);
        let mut shapes = Vec::new();
        let mut shape_index = HashMap::new();
        let mut tables = HashMap::new();

        for entity in registry.enumerate() {
            let fields = describe(entity, base);
            let add = synthesize_create(&entity.name, &entity.tags, &fields);
            let update = synthesize_update(&entity.name, &identifier, &fields);

            for shape in [add, update] {
                claim(&mut owners, &shape.name, &format!("entity {}", entity.name))?;
                shape_index.insert(shape.name.clone(), shapes.len());
                shapes.push(shape);
            }

            let ops = [
                (ContainerKind::Query, set_operation(&entity.name, &options.paging)),
                (ContainerKind::Query, by_id_operation(&entity.name, &base.pk_type)),
                (
                    ContainerKind::Mutation,
                    add_operation(&entity.name, &create_shape_name(&entity.name)),
                ),
                (
                    ContainerKind::Mutation,
                    update_operation(&entity.name, &update_shape_name(&entity.name), &base.pk_type),
                ),
            ];
            for (kind, op) in ops {
                let container = match kind {
                    ContainerKind::Query => &mut query,
                    ContainerKind::Mutation => &mut mutation,
                };
                let name = op.name.clone();
                container.insert(op).map_err(|first| SynthesisError::NameCollision {
                    name: format!("{}.{}", kind.name(), name),
                    first: format!("entity {}", first),
                    second: format!("entity {}", entity.name),
                })?;
            }

            let table = EntityTable::new(
                &entity.name,
                base,
                describe_all(entity, base),
                &registry,
            );
            tables.insert(entity.name.clone(), Arc::new(table));
        }

        tracing::info!(
            entities = registry.len(),
            queries = query.len(),
            mutations = mutation.len(),
            shapes = shapes.len(),
            "schema synthesized"
        );

        Ok(ApiSchema {
            registry,
            query,
            mutation,
            shapes,
            shape_index,
            tables,
        })
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn query(&self) -> &Container {
        &self.query
    }

    pub fn mutation(&self) -> &Container {
        &self.mutation
    }

    pub fn container(&self, kind: ContainerKind) -> &Container {
        match kind {
            ContainerKind::Query => &self.query,
            ContainerKind::Mutation => &self.mutation,
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, name: &str) -> Option<&Shape> {
        self.shape_index.get(name).map(|&i| &self.shapes[i])
    }

    pub fn table(&self, entity: &str) -> Option<&Arc<EntityTable>> {
        self.tables.get(entity)
    }

    /// Tables in registry order (for DDL and seeding).
    pub fn tables(&self) -> Vec<Arc<EntityTable>> {
        self.registry
            .enumerate()
            .filter_map(|e| self.tables.get(&e.name).cloned())
            .collect()
    }

    pub fn document(&self) -> SchemaDocument<'_> {
        SchemaDocument {
            query: &self.query,
            mutation: &self.mutation,
            shapes: &self.shapes,
            entities: self
                .registry
                .enumerate()
                .filter_map(|e| self.tables.get(&e.name).map(|t| t.as_ref()))
                .collect(),
        }
    }

    /// Dispatch table: look up `operation` in the container and forward to its
    /// generic implementation, unmodified.
    pub async fn invoke(
        &self,
        kind: ContainerKind,
        operation: &str,
        args: Arguments,
        session: &mut dyn Session,
        cancel: &CancellationToken,
    ) -> Result<Output, AppError> {
        let op = self
            .container(kind)
            .operation(operation)
            .ok_or_else(|| AppError::NotFound(format!("{}.{}", kind.name(), operation)))?;
        let table = self
            .tables
            .get(&op.entity)
            .ok_or_else(|| AppError::NotFound(op.entity.clone()))?;
        tracing::debug!(operation = %op.name, handler = ?op.handler, "invoke");

        match op.handler {
            Handler::Set => Ok(Output::Collection(CrudService::set(table, session).await?)),
            Handler::WhereById => {
                let id = required_id(&args, op)?;
                Ok(Output::Collection(CrudService::where_id(table, &id, session).await?))
            }
            Handler::Add => {
                let shape = self.input_shape(op)?;
                let input = match args.input {
                    Some(Input::Create(input)) => input,
                    _ => return Err(AppError::BadRequest(format!("{} expects {}", op.name, shape.name))),
                };
                let row = CrudService::add(shape, table, &input, session, cancel).await?;
                Ok(Output::Entity(row))
            }
            Handler::Update => {
                let id = required_id(&args, op)?;
                let shape = self.input_shape(op)?;
                let input = match args.input {
                    Some(Input::Update(input)) => input,
                    _ => return Err(AppError::BadRequest(format!("{} expects {}", op.name, shape.name))),
                };
                let row = CrudService::update(&id, shape, table, &input, session, cancel).await?;
                Ok(Output::Entity(row))
            }
        }
    }

    fn input_shape(&self, op: &Operation) -> Result<&Shape, AppError> {
        op.input_shape()
            .and_then(|name| self.shape(name))
            .ok_or_else(|| AppError::NotFound(format!("input shape for {}", op.name)))
    }
}

fn claim(owners: &mut HashMap<String, String>, name: &str, owner: &str) -> Result<(), SynthesisError> {
    if let Some(first) = owners.get(name) {
        return Err(SynthesisError::NameCollision {
            name: name.to_string(),
            first: first.clone(),
            second: owner.to_string(),
        });
    }
    owners.insert(name.to_string(), owner.to_string());
    Ok(())
}

fn required_id(args: &Arguments, op: &Operation) -> Result<Value, AppError> {
    match &args.id {
        Some(id) if !id.is_null() => Ok(id.clone()),
        _ => Err(AppError::BadRequest(format!("{} requires an id", op.name))),
    }
}
