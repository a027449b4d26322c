//! Generic CRUD operations. One implementation per behavior, parameterized by
//! the input shape and entity table of the invoking operation.

use crate::error::AppError;
use crate::merge::{apply_field_changes, copy_shared_fields};
use crate::service::RequestValidator;
use crate::store::{Change, EntityTable, Record, Session};
use crate::synth::{CreateInput, Shape, UpdateInput};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct CrudService;

impl CrudService {
    /// The full, unfiltered collection.
    pub async fn set(table: &EntityTable, session: &mut dyn Session) -> Result<Vec<Record>, AppError> {
        Ok(session.set(table).await?)
    }

    /// Records whose identifier equals `id`. Zero or one in practice.
    pub async fn where_id(
        table: &EntityTable,
        id: &Value,
        session: &mut dyn Session,
    ) -> Result<Vec<Record>, AppError> {
        let id = RequestValidator::decode_id(&table.pk_type, id)?;
        Ok(session.find(table, &id).await?)
    }

    /// Default-initialize, copy the create input over, stage, commit. Returns the
    /// persisted record carrying its assigned identifier.
    pub async fn add(
        shape: &Shape,
        table: &Arc<EntityTable>,
        input: &CreateInput,
        session: &mut dyn Session,
        cancel: &CancellationToken,
    ) -> Result<Record, AppError> {
        let mut record = table.defaults.clone();
        copy_shared_fields(shape, &input.values, &table.fields, &mut record);
        session.stage(Change::Insert {
            table: table.clone(),
            record,
        });
        let persisted = session.commit(cancel).await?;
        let row = persisted
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} after insert", table.name)))?;
        tracing::debug!(entity = %table.name, id = ?table.id_of(&row), "added");
        Ok(row)
    }

    /// Load exactly one record by `id`, merge the tri-state changes onto it, commit.
    pub async fn update(
        id: &Value,
        shape: &Shape,
        table: &Arc<EntityTable>,
        input: &UpdateInput,
        session: &mut dyn Session,
        cancel: &CancellationToken,
    ) -> Result<Record, AppError> {
        let id = RequestValidator::decode_id(&table.pk_type, id)?;
        if !input.id.is_null() && RequestValidator::decode_id(&table.pk_type, &input.id)? != id {
            return Err(AppError::Validation(format!(
                "{} in input does not match the targeted {}",
                table.identifier, table.identifier
            )));
        }

        let mut matches = session.find(table, &id).await?;
        let mut record = match matches.len() {
            0 => return Err(AppError::NotFound(format!("{} {}", table.name, id))),
            1 => matches.remove(0),
            n => {
                return Err(AppError::Ambiguous(format!(
                    "{} matches for {} {}",
                    n, table.name, id
                )))
            }
        };

        let written = apply_field_changes(shape, &input.changes, &table.fields, &mut record)?;
        session.stage(Change::Update {
            table: table.clone(),
            id: id.clone(),
            record,
        });
        let persisted = session.commit(cancel).await?;
        let row = persisted
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} {}", table.name, id)))?;
        tracing::debug!(entity = %table.name, id = %id, fields = written, "updated");
        Ok(row)
    }
}
