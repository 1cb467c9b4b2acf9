//! Loading [`BatchConfig`] from YAML.

use anyhow::Context;
use bulk_delete::BatchConfig;
use std::path::Path;

/// Read a YAML batch configuration. Missing fields keep their defaults.
///
/// ```yaml
/// worker_pool_size: 16
/// per_task_chunk_size: 1000
/// settle_delay_secs: 5
/// ```
pub fn load_batch_config(path: &Path) -> anyhow::Result<BatchConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch config file: {path:?}"))?;
    let config: BatchConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse batch config file: {path:?}"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_partial_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "worker_pool_size: 8\nper_task_chunk_size: 1000").unwrap();

        let config = load_batch_config(file.path()).unwrap();
        assert_eq!(config.worker_pool_size, 8);
        assert_eq!(config.per_task_chunk_size, 1000);
        assert_eq!(config.read_page_size, BatchConfig::default().read_page_size);
    }

    #[test]
    fn test_load_rejects_unknown_types() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "worker_pool_size: many").unwrap();
        assert!(load_batch_config(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_batch_config(Path::new("/nonexistent/batch.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read batch config file"));
    }
}
