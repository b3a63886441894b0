use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Writes rows to a CSV destination. If the first attempt fails (the
/// destination is locked or otherwise unwritable) a single retry is made
/// against a timestamp-suffixed filename so the data is never lost.
/// Returns the path that was actually written.
#[instrument(skip(rows), err)]
pub fn write_rows<T: Serialize>(rows: &[T], destination: &str) -> Result<PathBuf> {
    match write_to(rows, Path::new(destination)) {
        Ok(()) => {
            info!("Exported {} rows to {}", rows.len(), destination);
            Ok(PathBuf::from(destination))
        }
        Err(first_error) => {
            let fallback = fallback_destination(destination);
            warn!(
                "Export to {} failed ({}), retrying with {}",
                destination,
                first_error,
                fallback.display()
            );
            write_to(rows, &fallback)?;
            info!("Exported {} rows to {}", rows.len(), fallback.display());
            Ok(fallback)
        }
    }
}

fn write_to<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn fallback_destination(destination: &str) -> PathBuf {
    let path = Path::new(destination);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("csv");
    let suffix = chrono::Local::now().format("%Y%m%d_%H%M%S");

    path.with_file_name(format!("{}_{}.{}", stem, suffix, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "sessionId")]
        session_id: String,
        user_content: String,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                session_id: "S1".to_string(),
                user_content: "sort a list".to_string(),
            },
            Row {
                session_id: "S2".to_string(),
                user_content: "explain, with \"quotes\"".to_string(),
            },
        ]
    }

    #[test]
    fn writes_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");

        let written = write_rows(&rows(), dest.to_str().unwrap()).unwrap();
        assert_eq!(written, dest);

        let content = std::fs::read_to_string(&written).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("sessionId,user_content"));
        assert_eq!(lines.next(), Some("S1,sort a list"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn unwritable_destination_falls_back_to_suffixed_name() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the destination path makes the first attempt fail.
        let dest = dir.path().join("out.csv");
        std::fs::create_dir(&dest).unwrap();

        let written = write_rows(&rows(), dest.to_str().unwrap()).unwrap();
        assert_ne!(written, dest);
        let name = written.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("out_"));
        assert!(name.ends_with(".csv"));

        let content = std::fs::read_to_string(&written).unwrap();
        assert!(content.contains("sort a list"));
    }
}
