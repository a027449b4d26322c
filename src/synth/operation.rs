//! Operation descriptors for the Query and Mutation containers. Each descriptor
//! names the generic implementation it forwards to and the capabilities the
//! serving layer must apply around it.

use crate::config::PkType;
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PagingOptions {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub include_total_count: bool,
}

impl Default for PagingOptions {
    fn default() -> Self {
        PagingOptions {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            include_total_count: true,
        }
    }
}

/// Declarative capability tags interpreted by the serving layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paging: Option<PagingOptions>,
    pub projection: bool,
    pub filtering: bool,
    pub sorting: bool,
    pub single_result: bool,
}

impl CapabilitySet {
    /// Paged, projectable, filterable, sortable collection.
    pub fn collection(paging: PagingOptions) -> Self {
        CapabilitySet {
            paging: Some(paging),
            projection: true,
            filtering: true,
            sorting: true,
            single_result: false,
        }
    }

    /// At most one result, projectable.
    pub fn single() -> Self {
        CapabilitySet {
            projection: true,
            single_result: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    /// Identifier; `encoded` marks it for the serving layer's id encoding.
    Id { pk_type: PkType, encoded: bool },
    Input { shape: String },
    Context,
    Cancellation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParamKind,
}

impl Param {
    fn new(name: &str, kind: ParamKind) -> Self {
        Param {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum Returns {
    Collection(String),
    Entity(String),
}

/// The generic implementation an operation forwards to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    Set,
    WhereById,
    Add,
    Update,
}

#[derive(Clone, Debug, Serialize)]
pub struct Operation {
    pub name: String,
    pub entity: String,
    pub params: Vec<Param>,
    pub returns: Returns,
    pub capabilities: CapabilitySet,
    pub handler: Handler,
}

impl Operation {
    /// Shape name of the input parameter, if any.
    pub fn input_shape(&self) -> Option<&str> {
        self.params.iter().find_map(|p| match &p.kind {
            ParamKind::Input { shape } => Some(shape.as_str()),
            _ => None,
        })
    }

    pub fn takes_id(&self) -> bool {
        self.params.iter().any(|p| matches!(p.kind, ParamKind::Id { .. }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ContainerKind {
    Query,
    Mutation,
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Query => "Query",
            ContainerKind::Mutation => "Mutation",
        }
    }
}

/// Named set of operations, in synthesis order.
#[derive(Clone, Debug, Serialize)]
pub struct Container {
    pub name: String,
    pub operations: Vec<Operation>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Container {
            name: kind.name().to_string(),
            operations: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.index.get(name).map(|&i| &self.operations[i])
    }

    /// Adds `op`; returns the existing operation's entity on a name clash.
    pub(crate) fn insert(&mut self, op: Operation) -> Result<(), String> {
        if let Some(&i) = self.index.get(&op.name) {
            return Err(self.operations[i].entity.clone());
        }
        self.index.insert(op.name.clone(), self.operations.len());
        self.operations.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// `{E}Set`: the full collection, shaped downstream by paging/filtering/sorting/projection.
pub fn set_operation(entity: &str, paging: &PagingOptions) -> Operation {
    Operation {
        name: format!("{}Set", entity),
        entity: entity.to_string(),
        params: vec![Param::new("context", ParamKind::Context)],
        returns: Returns::Collection(entity.to_string()),
        capabilities: CapabilitySet::collection(paging.clone()),
        handler: Handler::Set,
    }
}

/// `{E}ById`: identifier filter, coerced to a single result downstream.
pub fn by_id_operation(entity: &str, pk_type: &PkType) -> Operation {
    Operation {
        name: format!("{}ById", entity),
        entity: entity.to_string(),
        params: vec![
            Param::new(
                "id",
                ParamKind::Id {
                    pk_type: pk_type.clone(),
                    encoded: true,
                },
            ),
            Param::new("context", ParamKind::Context),
        ],
        returns: Returns::Collection(entity.to_string()),
        capabilities: CapabilitySet::single(),
        handler: Handler::WhereById,
    }
}

pub fn add_operation(entity: &str, shape: &str) -> Operation {
    Operation {
        name: format!("Add{}", entity),
        entity: entity.to_string(),
        params: vec![
            Param::new(
                "new",
                ParamKind::Input {
                    shape: shape.to_string(),
                },
            ),
            Param::new("context", ParamKind::Context),
            Param::new("ct", ParamKind::Cancellation),
        ],
        returns: Returns::Entity(entity.to_string()),
        capabilities: CapabilitySet::default(),
        handler: Handler::Add,
    }
}

pub fn update_operation(entity: &str, shape: &str, pk_type: &PkType) -> Operation {
    Operation {
        name: format!("Update{}", entity),
        entity: entity.to_string(),
        params: vec![
            Param::new(
                "id",
                ParamKind::Id {
                    pk_type: pk_type.clone(),
                    encoded: true,
                },
            ),
            Param::new(
                "update",
                ParamKind::Input {
                    shape: shape.to_string(),
                },
            ),
            Param::new("context", ParamKind::Context),
            Param::new("ct", ParamKind::Cancellation),
        ],
        returns: Returns::Entity(entity.to_string()),
        capabilities: CapabilitySet::default(),
        handler: Handler::Update,
    }
}
