//! CSV export and import of the persisted section set.

use std::path::Path;

use tracing::info;

use raven_core::{Error, Result};
use raven_store::Section;

const HEADER: [&str; 2] = ["Source", "Content"];

/// Write sections to a two-column CSV with a `Source,Content` header.
pub fn export_sections(path: impl AsRef<Path>, sections: &[Section]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::Ingest(e.to_string()))?;
    writer
        .write_record(HEADER)
        .map_err(|e| Error::Ingest(e.to_string()))?;
    for section in sections {
        writer
            .write_record([&section.identifier, &section.content])
            .map_err(|e| Error::Ingest(e.to_string()))?;
    }
    writer.flush()?;
    info!("Exported {} sections to {}", sections.len(), path.display());
    Ok(())
}

/// Read sections back from a CSV produced by [`export_sections`].
///
/// Rows with an empty identifier or empty content are skipped.
pub fn import_sections(path: impl AsRef<Path>) -> Result<Vec<Section>> {
    let path = path.as_ref();
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| Error::Ingest(e.to_string()))?;
    let mut sections = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Ingest(e.to_string()))?;
        let identifier = record.get(0).unwrap_or_default().trim();
        let content = record.get(1).unwrap_or_default();
        if identifier.is_empty() || content.trim().is_empty() {
            continue;
        }
        sections.push(Section::new(identifier, content));
    }
    info!("Imported {} sections from {}", sections.len(), path.display());
    Ok(sections)
}
