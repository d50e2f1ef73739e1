//! Named sparse features for a protein/location pair.

use regex::Regex;
use std::sync::OnceLock;

use super::sentences::SentenceIndex;
use crate::annotation::{char_slice, Entity, EntityClass};

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\w+").expect("Invalid token regex"))
}

/// Everything pair features are computed from
pub struct PairContext<'a> {
    pub text: &'a str,
    pub sentences: &'a SentenceIndex,
    pub entities: &'a [Entity],
    pub protein: &'a Entity,
    pub location: &'a Entity,
}

impl PairContext<'_> {
    fn sentence_distance(&self) -> usize {
        let p = self.sentences.sentence_of(self.protein.offset);
        let l = self.sentences.sentence_of(self.location.offset);
        p.abs_diff(l)
    }

    /// Character range strictly between the two spans (empty when they overlap)
    fn gap(&self) -> (usize, usize) {
        let (first, second) = if self.protein.offset <= self.location.offset {
            (self.protein, self.location)
        } else {
            (self.location, self.protein)
        };
        let start = first.end().unwrap_or(first.offset);
        (start, second.offset.max(start))
    }
}

/// Compute the pair's features in a fixed order
pub fn pair_features(ctx: &PairContext<'_>) -> Vec<(String, f64)> {
    let mut features = Vec::new();
    let sentence_distance = ctx.sentence_distance();
    let (gap_start, gap_end) = ctx.gap();
    let between = char_slice(ctx.text, gap_start, gap_end);
    let tokens: Vec<String> = token_regex()
        .find_iter(between)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    features.push(("same_sentence".to_string(), if sentence_distance == 0 { 1.0 } else { 0.0 }));
    features.push(("sentence_distance".to_string(), sentence_distance as f64));
    features.push((
        "protein_before_location".to_string(),
        if ctx.protein.offset < ctx.location.offset { 1.0 } else { 0.0 },
    ));
    features.push(("token_proximity".to_string(), 1.0 / (1.0 + tokens.len() as f64)));

    let entities_between = ctx
        .entities
        .iter()
        .filter(|e| matches!(e.class, EntityClass::Protein | EntityClass::Location))
        .filter(|e| e.offset >= gap_start && e.end().is_some_and(|end| end <= gap_end))
        .count();
    features.push(("entities_between".to_string(), entities_between as f64));

    features.push((
        "protein_normalized".to_string(),
        if ctx.protein.norms.is_empty() { 0.0 } else { 1.0 },
    ));
    features.push((
        "location_normalized".to_string(),
        if ctx.location.norms.is_empty() { 0.0 } else { 1.0 },
    ));

    for token in tokens {
        features.push((format!("bow_between::{}", token), 1.0));
    }

    features.push((
        format!("location_text::{}", ctx.location.text.to_lowercase()),
        1.0,
    ));

    features
}
