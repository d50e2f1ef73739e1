use regex::Regex;
use std::sync::OnceLock;

use crate::annotation::char_len;

fn boundary_regex() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("Invalid sentence regex"))
}

/// Character offsets at which sentences start
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceIndex {
    starts: Vec<usize>,
}

impl SentenceIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for m in boundary_regex().find_iter(text) {
            if m.end() < text.len() {
                starts.push(char_len(&text[..m.end()]));
            }
        }
        Self { starts }
    }

    /// Number of sentences; at least one, even for empty text
    pub fn sentence_count(&self) -> usize {
        self.starts.len()
    }

    /// Index of the sentence containing the character at `offset`
    pub fn sentence_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|start| *start <= offset).saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sentence() {
        let index = SentenceIndex::new("TP53 localizes to the nucleus");
        assert_eq!(index.sentence_count(), 1);
        assert_eq!(index.sentence_of(0), 0);
        assert_eq!(index.sentence_of(22), 0);
    }

    #[test]
    fn test_multiple_sentences() {
        let text = "TP53 is a protein. It is found in the nucleus! Really? Yes.";
        let index = SentenceIndex::new(text);
        assert_eq!(index.sentence_count(), 4);
        assert_eq!(index.sentence_of(0), 0);
        assert_eq!(index.sentence_of(19), 1);
        assert_eq!(index.sentence_of(38), 1);
        assert_eq!(index.sentence_of(47), 2);
        assert_eq!(index.sentence_of(55), 3);
    }

    #[test]
    fn test_empty_text_is_one_sentence() {
        let index = SentenceIndex::new("");
        assert_eq!(index.sentence_count(), 1);
        assert_eq!(index.sentence_of(0), 0);
    }

    #[test]
    fn test_trailing_punctuation_does_not_open_sentence() {
        let index = SentenceIndex::new("One sentence.  ");
        assert_eq!(index.sentence_count(), 1);
    }

    #[test]
    fn test_closing_quote_stays_in_sentence() {
        let index = SentenceIndex::new("He said \"stop.\" Then left");
        assert_eq!(index.sentence_count(), 2);
        assert_eq!(index.sentence_of(16), 1);
    }
}
