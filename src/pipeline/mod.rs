//! End-to-end annotation: tag, extract, normalize and merge.

pub mod batch;

pub use batch::{read_ids, run_batch, BatchFailure, BatchReport};

use std::sync::Arc;

use crate::annotation::{Entity, Relation};
use crate::config::Config;
use crate::error::Result;
use crate::merge::{merge, WriteMode};
use crate::normalize::{normalize, NormalizedRecordSet};
use crate::relation::{RelationExtractor, RelationModel};
use crate::store::{self, DocumentStore};
use crate::tagger::{EntityTagger, StringTagger};

/// Predictions for one text together with their normalized records
#[derive(Debug, Clone)]
pub struct Annotation {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub records: NormalizedRecordSet,
}

/// The wired components of one process
pub struct Pipeline {
    tagger: Arc<dyn EntityTagger>,
    extractor: RelationExtractor,
    store: Arc<dyn DocumentStore>,
    write_mode: WriteMode,
}

impl Pipeline {
    pub fn new(
        tagger: Arc<dyn EntityTagger>,
        extractor: RelationExtractor,
        store: Arc<dyn DocumentStore>,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            tagger,
            extractor,
            store,
            write_mode,
        }
    }

    /// Load the model and connect the tagger and store.
    ///
    /// A model that fails to load is `ModelConfiguration`, which callers treat
    /// as fatal.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let model = RelationModel::load(&config.model.path, &config.model.features_path)?;
        log::info!(
            "Loaded relation model for {} with {} features",
            model.relation_class(),
            model.feature_count()
        );

        let tagger = StringTagger::from_config(&config.tagger)?;
        log::info!("Tagger endpoint: {}", tagger.endpoint());

        let store = store::open(&config.store).await?;
        let write_mode = WriteMode::from_conditional(config.conditional_writes());

        Ok(Self::new(
            Arc::new(tagger),
            RelationExtractor::new(Arc::new(model), config.model.sentence_distance),
            store,
            write_mode,
        ))
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Tag, extract and normalize a text without touching the store
    pub async fn annotate(&self, text: &str) -> Result<Annotation> {
        let entities = self.tagger.tag(text).await?;
        let relations = self.extractor.extract(text, &entities);
        let records = normalize(&entities, &relations)?;

        log::debug!(
            "Annotated {} entities, {} relations",
            entities.len(),
            relations.len()
        );

        Ok(Annotation {
            entities,
            relations,
            records,
        })
    }

    /// Annotate the stored text of document `id` and merge the records into it
    pub async fn process_document(&self, id: &str) -> Result<NormalizedRecordSet> {
        let text = self.store.source_text(id).await?;
        let annotation = self.annotate(&text).await?;
        merge(self.store.as_ref(), id, &annotation.records, self.write_mode).await?;
        log::info!(
            "Document {}: {} proteins, {} locations, {} relations",
            id,
            annotation.records.protein_info.len(),
            annotation.records.location_info.len(),
            annotation.records.relation_info.len()
        );
        Ok(annotation.records)
    }
}
