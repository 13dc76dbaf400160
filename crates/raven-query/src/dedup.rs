//! Source deduplication for retrieved chunks.

use std::collections::HashSet;

use raven_index::ScoredPoint;

/// Collapse retrieved chunks to their distinct section identifiers, keeping
/// first-appearance order. Since hits arrive best-first, the first appearance
/// is also the best-scoring one.
pub fn dedup_sources(hits: &[ScoredPoint]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut sources = Vec::new();
    for hit in hits {
        if seen.insert(&hit.source) {
            sources.push(hit.source.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, score: f32) -> ScoredPoint {
        ScoredPoint {
            source: source.into(),
            text: String::new(),
            score,
        }
    }

    #[test]
    fn test_dedup_keeps_first_appearance_order() {
        let hits = vec![
            hit("B", 0.9),
            hit("A", 0.8),
            hit("B", 0.7),
            hit("C", 0.6),
            hit("A", 0.5),
        ];
        assert_eq!(dedup_sources(&hits), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_dedup_empty() {
        assert!(dedup_sources(&[]).is_empty());
    }
}
