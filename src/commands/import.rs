use clap::Args;
use std::fs;
use std::path::PathBuf;

use finsync_core::{DataService, ImportReport};

/// Restore keys from a backup file
#[derive(Args)]
pub struct ImportCommand {
    /// Backup file written by `finsync export`
    path: PathBuf,
}

impl ImportCommand {
    pub async fn run(&self, service: &DataService) -> Result<(), Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(&self.path)?;
        let bundle: serde_json::Value = serde_json::from_str(&contents)?;

        let report = service.import_all(&bundle).await?;
        print!("{}", render_report(&report));

        if report.failed.is_empty() {
            Ok(())
        } else {
            Err(format!("{} key(s) failed to import", report.failed.len()).into())
        }
    }
}

fn render_report(report: &ImportReport) -> String {
    let mut out = format!("Imported {} key(s)\n", report.imported_count);
    for key in &report.skipped {
        out.push_str(&format!("  - {} skipped (no data)\n", key));
    }
    for (key, reason) in &report.failed {
        out.push_str(&format!("  ✗ {}: {}\n", key, reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsync_core::DataKey;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_render_report() {
        let report = ImportReport {
            imported_count: 2,
            skipped: vec![DataKey::Goals],
            failed: vec![(DataKey::Budgets, "Storage is full".into())],
        };

        let out = render_report(&report);
        assert!(out.starts_with("Imported 2 key(s)"));
        assert!(out.contains("GOALS skipped"));
        assert!(out.contains("✗ BUDGETS: Storage is full"));
    }

    #[tokio::test]
    async fn test_import_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("backup.json");
        let bundle = json!({
            "exportTime": "2024-01-15T10:00:00Z",
            "version": "1.0",
            "data": { "GOALS": { "data": [{"id": 1, "name": "Car"}] } }
        });
        fs::write(&path, bundle.to_string()).unwrap();

        let service = DataService::in_memory();
        ImportCommand { path }.run(&service).await.unwrap();

        assert_eq!(
            service.load(DataKey::Goals, json!([])),
            json!([{"id": 1, "name": "Car"}])
        );
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_bundle() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("backup.json");
        fs::write(&path, r#"{"version": "1.0"}"#).unwrap();

        let service = DataService::in_memory();
        let err = ImportCommand { path }.run(&service).await.unwrap_err();
        assert!(err.to_string().contains("Invalid import format"));
    }
}
