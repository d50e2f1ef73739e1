//! Entity tagger client: obtains typed entity mentions from an external NER service.

mod cache;
mod string_tagger;

pub use cache::TagCache;
pub use string_tagger::{EntityTypes, StringTagger};

use async_trait::async_trait;

use crate::annotation::Entity;
use crate::error::Result;

/// Source of entity mentions for a text.
///
/// Implementations return either the full, type-filtered mention list or an
/// error; never a partial list.
#[async_trait]
pub trait EntityTagger: Send + Sync {
    async fn tag(&self, text: &str) -> Result<Vec<Entity>>;
}
