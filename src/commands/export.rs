use clap::Args;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use finsync_core::{DataService, ExportBundle};

/// Write a backup of every stored key
#[derive(Args)]
pub struct ExportCommand {
    /// Output file; "-" writes to stdout. Defaults to
    /// finance-data-backup-<date>.json in the current directory
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl ExportCommand {
    pub fn run(&self, service: &DataService) -> Result<(), Box<dyn std::error::Error>> {
        let bundle = service.export_all();
        let json = serde_json::to_string_pretty(&bundle)?;

        match self.output.as_deref() {
            Some(path) if path == Path::new("-") => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", json)?;
            }
            output => {
                let path = target_path(output, &bundle);
                fs::write(&path, json)?;
                println!(
                    "Exported {} key{} to {}",
                    bundle.data.len(),
                    if bundle.data.len() == 1 { "" } else { "s" },
                    path.display()
                );
            }
        }

        Ok(())
    }
}

fn target_path(output: Option<&Path>, bundle: &ExportBundle) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(bundle.file_name()),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(bundle.file_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_target_path() {
        let service = DataService::in_memory();
        let bundle = service.export_all();
        let temp_dir = tempdir().unwrap();

        assert_eq!(
            target_path(None, &bundle),
            PathBuf::from(bundle.file_name())
        );
        assert_eq!(
            target_path(Some(temp_dir.path()), &bundle),
            temp_dir.path().join(bundle.file_name())
        );
        let file = temp_dir.path().join("backup.json");
        assert_eq!(target_path(Some(&file), &bundle), file);
    }

    #[test]
    fn test_export_writes_bundle() {
        let service = DataService::in_memory();
        service
            .persist(finsync_core::DataKey::Goals, serde_json::json!([]), true)
            .unwrap();
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("backup.json");

        let cmd = ExportCommand {
            output: Some(file.clone()),
        };
        cmd.run(&service).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(written["version"], "1.0");
        assert!(written["data"]["GOALS"].is_object());
    }
}
