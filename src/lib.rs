pub mod annotation;
pub mod config;
pub mod error;
pub mod db;
pub mod tagger;
pub mod relation;
pub mod normalize;
pub mod store;
pub mod merge;
pub mod pipeline;

pub use annotation::{Entity, EntityClass, Relation, REL_PRO_LOC_ID};
pub use config::Config;
pub use error::{LoctextError, Result};
pub use merge::{merge, WriteMode};
pub use normalize::{normalize, NormalizedRecordSet};
pub use pipeline::{Annotation, Pipeline};
