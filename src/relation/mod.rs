//! Relation extraction: scores protein/location pairs with a pre-fitted model.
//!
//! The model is loaded once per process and shared read-only; extraction is
//! a pure function of model, text and entities.

mod features;
mod model;
mod sentences;

pub use features::{pair_features, PairContext};
pub use model::{parse_feature_names, RelationModel};
pub use sentences::SentenceIndex;

use std::sync::Arc;

use crate::annotation::{Entity, EntityClass, Relation};

/// Emits relation candidates for entity pairs the model scores positive.
#[derive(Clone)]
pub struct RelationExtractor {
    model: Arc<RelationModel>,
    sentence_distance: usize,
}

impl RelationExtractor {
    pub fn new(model: Arc<RelationModel>, sentence_distance: usize) -> Self {
        Self {
            model,
            sentence_distance,
        }
    }

    /// Candidates in pair order `(i, j)`, `i < j`; `entity1` is always entity `i`
    pub fn extract(&self, text: &str, entities: &[Entity]) -> Vec<Relation> {
        let sentences = SentenceIndex::new(text);
        let mut relations = Vec::new();

        for (i, first) in entities.iter().enumerate() {
            for second in &entities[i + 1..] {
                let (protein, location) = match (first.class, second.class) {
                    (EntityClass::Protein, EntityClass::Location) => (first, second),
                    (EntityClass::Location, EntityClass::Protein) => (second, first),
                    _ => continue,
                };

                let distance = sentences
                    .sentence_of(protein.offset)
                    .abs_diff(sentences.sentence_of(location.offset));
                if distance > self.sentence_distance {
                    continue;
                }

                let ctx = PairContext {
                    text,
                    sentences: &sentences,
                    entities,
                    protein,
                    location,
                };
                let features = pair_features(&ctx);
                let score = self
                    .model
                    .score(features.iter().map(|(name, value)| (name.as_str(), *value)));

                if self.model.is_positive(score) {
                    relations.push(Relation {
                        entity1: first.clone(),
                        entity2: second.clone(),
                        class_id: self.model.relation_class().to_string(),
                        score: Some(score),
                    });
                }
            }
        }

        log::debug!(
            "Extracted {} relations from {} entities over {} sentences",
            relations.len(),
            entities.len(),
            sentences.sentence_count()
        );

        relations
    }
}
