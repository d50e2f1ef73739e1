//! Result normalization: predicted entities and relations to the stored record schema.
//!
//! Keys (`protN`, `locN`, `relationN`) are dense, zero-based and follow the
//! order predictions were produced in. Mappings are rebuilt from scratch on
//! every run and replace the stored fields wholesale.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::annotation::{Entity, EntityClass, Relation, REL_PRO_LOC_ID};
use crate::error::{LoctextError, Result};

pub const PROTEIN_INFO_FIELD: &str = "Protein_Info";
pub const LOCATION_INFO_FIELD: &str = "Location_Info";
pub const RELATION_INFO_FIELD: &str = "Relation_Info";

/// The three document fields the pipeline owns.
pub const RECORD_FIELDS: [&str; 3] = [PROTEIN_INFO_FIELD, LOCATION_INFO_FIELD, RELATION_INFO_FIELD];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub accession_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub go_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub accession_ids: Vec<String>,
    pub go_ids: Vec<String>,
    pub protein_ref: String,
    pub location_ref: String,
}

/// Merge payload for one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecordSet {
    pub protein_info: IndexMap<String, ProteinRecord>,
    pub location_info: IndexMap<String, LocationRecord>,
    pub relation_info: IndexMap<String, RelationRecord>,
}

impl NormalizedRecordSet {
    pub fn is_empty(&self) -> bool {
        self.protein_info.is_empty() && self.location_info.is_empty() && self.relation_info.is_empty()
    }

    /// Document fields to overwrite, in `RECORD_FIELDS` order
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        fields.insert(PROTEIN_INFO_FIELD.to_string(), serde_json::to_value(&self.protein_info)?);
        fields.insert(LOCATION_INFO_FIELD.to_string(), serde_json::to_value(&self.location_info)?);
        fields.insert(RELATION_INFO_FIELD.to_string(), serde_json::to_value(&self.relation_info)?);
        Ok(fields)
    }
}

/// Half-open character span of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn of(entity: &Entity) -> Result<Self> {
        if entity.is_empty() {
            return Err(LoctextError::MalformedPrediction(format!(
                "{} entity at offset {} has no text",
                entity.class.class_id(),
                entity.offset
            )));
        }
        let end = entity.end().ok_or_else(|| {
            LoctextError::MalformedPrediction(format!(
                "entity '{}' offset {} overflows",
                entity.text, entity.offset
            ))
        })?;
        Ok(Self {
            start: entity.offset,
            end,
        })
    }

    /// `"<start>_<end>"`
    fn reference(&self) -> String {
        format!("{}_{}", self.start, self.end)
    }
}

/// Protein and location sides of a relation, chosen by class
fn sides(relation: &Relation) -> Result<(&Entity, &Entity)> {
    match (relation.entity1.class, relation.entity2.class) {
        (EntityClass::Protein, EntityClass::Location) => Ok((&relation.entity1, &relation.entity2)),
        (EntityClass::Location, EntityClass::Protein) => Ok((&relation.entity2, &relation.entity1)),
        (a, b) => Err(LoctextError::MalformedPrediction(format!(
            "relation {} links {} '{}' and {} '{}', expected one protein and one location",
            relation.class_id,
            a.class_id(),
            relation.entity1.text,
            b.class_id(),
            relation.entity2.text
        ))),
    }
}

/// Build the record set from predictions in production order
pub fn normalize(entities: &[Entity], relations: &[Relation]) -> Result<NormalizedRecordSet> {
    let mut records = NormalizedRecordSet::default();

    for entity in entities {
        match entity.class {
            EntityClass::Protein => {
                let span = Span::of(entity)?;
                let key = format!("prot{}", records.protein_info.len());
                records.protein_info.insert(
                    key,
                    ProteinRecord {
                        text: entity.text.clone(),
                        start_offset: span.start,
                        end_offset: span.end,
                        accession_ids: entity.norms.clone(),
                    },
                );
            }
            EntityClass::Location => {
                let span = Span::of(entity)?;
                let key = format!("loc{}", records.location_info.len());
                records.location_info.insert(
                    key,
                    LocationRecord {
                        text: entity.text.clone(),
                        start_offset: span.start,
                        end_offset: span.end,
                        go_ids: entity.norms.clone(),
                    },
                );
            }
            EntityClass::Organism => {}
        }
    }

    for relation in relations {
        if relation.class_id != REL_PRO_LOC_ID {
            log::debug!("Skipping relation of class {}", relation.class_id);
            continue;
        }

        let (protein, location) = sides(relation)?;
        let key = format!("relation{}", records.relation_info.len());
        records.relation_info.insert(
            key,
            RelationRecord {
                accession_ids: protein.norms.clone(),
                go_ids: location.norms.clone(),
                protein_ref: Span::of(protein)?.reference(),
                location_ref: Span::of(location)?.reference(),
            },
        );
    }

    Ok(records)
}
