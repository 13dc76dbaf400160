//! Split normalized text into retrievable sections at level-1 headings.

use std::collections::HashSet;

use raven_store::Section;

/// Split normalized text into sections, one per `# ` heading.
///
/// The heading text (trimmed) becomes the section identifier; everything up
/// to the next heading becomes the content. Text before the first heading is
/// discarded, and sections whose body trims to nothing are dropped.
pub fn segment(normalized: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in normalized.lines() {
        if let Some(title) = line.strip_prefix("# ") {
            if let Some((identifier, body)) = current.take() {
                push_section(&mut sections, identifier, &body);
            }
            current = Some((title.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((identifier, body)) = current {
        push_section(&mut sections, identifier, &body);
    }
    sections
}

fn push_section(sections: &mut Vec<Section>, identifier: String, body: &[&str]) {
    let content = body.join("\n").trim().to_string();
    if !content.is_empty() && !identifier.is_empty() {
        sections.push(Section {
            identifier,
            content,
        });
    }
}

/// Identifiers that occur more than once, each reported once, in first-seen
/// order.
pub fn find_collisions(sections: &[Section]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    let mut collisions = Vec::new();
    for section in sections {
        if !seen.insert(&section.identifier) && reported.insert(&section.identifier) {
            collisions.push(section.identifier.clone());
        }
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_basic() {
        let text = "# Rule 1\n\nFirst body.\n\n# Rule 2\n\nSecond body.\n";
        let sections = segment(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].identifier, "Rule 1");
        assert_eq!(sections[0].content, "First body.");
        assert_eq!(sections[1].identifier, "Rule 2");
        assert_eq!(sections[1].content, "Second body.");
    }

    #[test]
    fn test_segment_without_blank_separators() {
        let text = "# Part A\nBody one.\n\n# Part B\nBody two.";
        let sections = segment(text);
        assert_eq!(
            sections,
            vec![
                Section::new("Part A", "Body one."),
                Section::new("Part B", "Body two."),
            ]
        );
    }

    #[test]
    fn test_segment_skips_preamble_and_empty() {
        let text = "stray preamble\n\n# Empty\n\n\n# Full\n\nBody.\n";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].identifier, "Full");
    }

    #[test]
    fn test_segment_keeps_subheadings_in_body() {
        let text = "# Rule 1\n\nBody.\n\n##### Example\n\nAn example.\n";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("##### Example"));
    }

    #[test]
    fn test_find_collisions_first_seen_order() {
        let sections = vec![
            Section::new("B", "1"),
            Section::new("A", "2"),
            Section::new("B", "3"),
            Section::new("A", "4"),
            Section::new("B", "5"),
        ];
        assert_eq!(find_collisions(&sections), vec!["B", "A"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(segment("").is_empty());
    }
}
