//! Bulk migration of records into a store's namespace.
//!
//! Either every record matched by the source query lands in the
//! destination namespace, or none do. Validation runs over the full
//! result set before the first insert; a failed insert rolls back the
//! records inserted so far. Only after full success does the optional
//! source-removal pass run, and a failure there is reported without
//! touching the destination.

use log::warn;
use zeroize::Zeroizing;

use crate::engine::{EngineError, KeychainEngine};
use crate::error::{KeychainError, KeychainResult};
use crate::query::{BaseQuery, InteractionMode, ItemQuery};

/// Copies every record matched by `source` into `destination`.
///
/// The source query is forced non-interactive: migration must never raise
/// an authentication prompt, so a source whose records are
/// interaction-gated fails at enumeration time.
pub(crate) fn migrate(
    engine: &dyn KeychainEngine,
    destination: &BaseQuery,
    source: ItemQuery,
    remove_on_completion: bool,
) -> KeychainResult<()> {
    let source = ItemQuery {
        prompt: None,
        interaction: InteractionMode::Disallowed,
        wants_data: true,
        ..source
    };
    if source.base == *destination {
        return Err(KeychainError::MigrationInvalidQuery);
    }

    let items = match engine.enumerate(source.clone(), None) {
        Ok(items) => items,
        Err(EngineError::ItemNotFound) => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    // Validate the full result set before the first write.
    let mut pairs: Vec<(String, Zeroizing<Vec<u8>>)> =
        Vec::with_capacity(items.len());
    for item in items {
        if item.key.is_empty() {
            return Err(KeychainError::MigrationInvalidKey);
        }
        let value = match item.value {
            Some(value) if !value.is_empty() => Zeroizing::new(value),
            _ => return Err(KeychainError::MigrationInvalidValue),
        };
        let probe = ItemQuery::for_namespace(destination.clone())
            .with_key(item.key.clone())
            .without_interaction();
        match engine.contains(probe) {
            Ok(()) | Err(EngineError::InteractionNotAllowed) => {
                return Err(KeychainError::MigrationKeyCollision(item.key));
            }
            Err(EngineError::ItemNotFound) => {}
            Err(err) => return Err(err.into()),
        }
        pairs.push((item.key, value));
    }

    let mut inserted: Vec<String> = Vec::with_capacity(pairs.len());
    for (key, value) in &pairs {
        let insert = ItemQuery::for_namespace(destination.clone())
            .with_key(key.clone())
            .with_value(value.to_vec());
        if let Err(err) = engine.set(insert) {
            roll_back(engine, destination, &inserted);
            return Err(err.into());
        }
        inserted.push(key.clone());
    }

    if remove_on_completion {
        for (key, _) in &pairs {
            let delete = ItemQuery::for_namespace(source.base.clone())
                .with_key(key.clone())
                .without_interaction();
            if let Err(err) = engine.delete(delete) {
                return Err(KeychainError::MigrationRemovalFailed(format!(
                    "{key}: {err}"
                )));
            }
        }
    }
    Ok(())
}

fn roll_back(
    engine: &dyn KeychainEngine,
    destination: &BaseQuery,
    inserted: &[String],
) {
    for key in inserted {
        let delete = ItemQuery::for_namespace(destination.clone())
            .with_key(key.clone());
        if let Err(err) = engine.delete(delete) {
            warn!("failed to roll back migrated record {key}: {err}");
        }
    }
}
