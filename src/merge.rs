//! Document merger: overlays the record fields onto a stored document.

use serde::Deserialize;

use crate::error::{LoctextError, Result};
use crate::normalize::NormalizedRecordSet;
use crate::store::DocumentStore;

/// How a merge write treats concurrent writers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Full-document upsert; a concurrent write in between is lost
    #[default]
    LastWriterWins,
    /// Write only if the document is unchanged since it was read
    IfUnchanged,
}

impl WriteMode {
    pub fn from_conditional(conditional: bool) -> Self {
        if conditional {
            WriteMode::IfUnchanged
        } else {
            WriteMode::LastWriterWins
        }
    }
}

/// Replace the record fields of document `id`, keeping every other field.
///
/// A missing document is `DocumentNotFound` and nothing is written. Under
/// `IfUnchanged` a concurrent modification surfaces as `VersionConflict`.
pub async fn merge(
    store: &dyn DocumentStore,
    id: &str,
    records: &NormalizedRecordSet,
    mode: WriteMode,
) -> Result<()> {
    let stored = store
        .get(id)
        .await?
        .ok_or_else(|| LoctextError::DocumentNotFound(id.to_string()))?;

    let mut document = stored.source;
    for (field, value) in records.to_fields()? {
        document.insert(field, value);
    }

    let expected = match mode {
        WriteMode::LastWriterWins => None,
        WriteMode::IfUnchanged => Some(stored.revision.ok_or_else(|| {
            LoctextError::StoreUnavailable(format!("store returned no revision for {}", id))
        })?),
    };

    store.index(id, &document, expected).await?;
    log::debug!(
        "Merged {} proteins, {} locations, {} relations into {}",
        records.protein_info.len(),
        records.location_info.len(),
        records.relation_info.len(),
        id
    );
    Ok(())
}
