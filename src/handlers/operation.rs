//! Handlers for the synthesized surface: schema document, queries and mutations.

use crate::case::{object_keys_to_declared, value_keys_to_camel_case_recursive};
use crate::error::AppError;
use crate::handlers::capabilities::{apply_capabilities, project, QueryArgs, Shaped};
use crate::response::{success_one, success_one_ok, success_page};
use crate::service::RequestValidator;
use crate::state::AppState;
use crate::store::Record;
use crate::synth::{Arguments, ContainerKind, Handler, Input};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Body of `POST /mutation/:operation`.
#[derive(Debug, Default, Deserialize)]
pub struct MutationBody {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub input: Option<Value>,
}

pub async fn schema(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let doc = serde_json::to_value(state.schema.document())
        .map_err(|e| AppError::Internal(format!("schema document: {}", e)))?;
    Ok(Json(doc))
}

pub async fn query(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let schema = &state.schema;
    let op = schema
        .query()
        .operation(&operation)
        .ok_or_else(|| AppError::NotFound(format!("Query.{}", operation)))?;
    let table = schema
        .table(&op.entity)
        .ok_or_else(|| AppError::NotFound(op.entity.clone()))?;

    let mut args = QueryArgs::parse(&params, table)?;
    let call = if op.takes_id() {
        let id = args
            .id
            .take()
            .ok_or_else(|| AppError::BadRequest(format!("{} requires an id", op.name)))?;
        Arguments::id(id)
    } else {
        if let Some(id) = args.id.take() {
            let id = RequestValidator::decode_id(&table.pk_type, &id)?;
            args.filters.push((table.identifier.clone(), id));
        }
        Arguments::none()
    };

    // cancelled if the client goes away and this future is dropped
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let mut session = state.store.session();
    let records = schema
        .invoke(ContainerKind::Query, &op.name, call, session.as_mut(), &cancel)
        .await?
        .into_records();

    match apply_capabilities(&op.capabilities, table, records, &args)? {
        Shaped::One(record) => Ok(success_one_ok(camel(record)).into_response()),
        Shaped::Page { items, meta } => {
            let items: Vec<Value> = items.into_iter().map(camel).collect();
            Ok(success_page(items, meta).into_response())
        }
    }
}

pub async fn mutation(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    Json(body): Json<MutationBody>,
) -> Result<Response, AppError> {
    let schema = &state.schema;
    let op = schema
        .mutation()
        .operation(&operation)
        .ok_or_else(|| AppError::NotFound(format!("Mutation.{}", operation)))?;
    let table = schema
        .table(&op.entity)
        .ok_or_else(|| AppError::NotFound(op.entity.clone()))?;
    let shape = op
        .input_shape()
        .and_then(|name| schema.shape(name))
        .ok_or_else(|| AppError::NotFound(format!("input shape for {}", op.name)))?;

    let input = match body.input {
        Some(Value::Object(obj)) => Value::Object(object_keys_to_declared(obj, |k| shape.field(k).is_some())),
        Some(_) | None => {
            return Err(AppError::Validation(format!("{} expects an input object", op.name)))
        }
    };

    let registry = schema.registry();
    let args = match op.handler {
        Handler::Add => Arguments::create(RequestValidator::decode_create(shape, registry, &input)?),
        Handler::Update => {
            let decoded = RequestValidator::decode_update(shape, registry, &table.pk_type, &input)?;
            let id = body.id.unwrap_or_else(|| decoded.id.clone());
            Arguments {
                id: Some(id),
                input: Some(Input::Update(decoded)),
            }
        }
        Handler::Set | Handler::WhereById => {
            return Err(AppError::BadRequest(format!("{} is not a mutation", op.name)))
        }
    };

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let mut session = state.store.session();
    let records = schema
        .invoke(ContainerKind::Mutation, &op.name, args, session.as_mut(), &cancel)
        .await?
        .into_records();
    let record = records
        .into_iter()
        .next()
        .map(|r| project(table, r, None))
        .ok_or_else(|| AppError::NotFound(op.entity.clone()))?;

    Ok(match op.handler {
        Handler::Add => success_one(camel(record)).into_response(),
        _ => success_one_ok(camel(record)).into_response(),
    })
}

fn camel(record: Record) -> Value {
    let mut v = Value::Object(record);
    value_keys_to_camel_case_recursive(&mut v);
    v
}
