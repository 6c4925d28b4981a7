//! YAML frequency configuration loading.
//!
//! Grounded on `FrequencyManager.load`/`process_frequencies_data`
//! (`original_source/apps/frequency_manager.py`): a `frequencies:` list of
//! entries each specifying either `single` or `lo`/`hi`, plus optional
//! `label`/`locked`/`priority`, parsed with `serde_yaml` the way the
//! teacher's `tetra_config` module parses its own TOML configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use radiomux_core::types::RawFrequencyEntry;

#[derive(Debug, Error)]
pub enum FrequencyConfigError {
    #[error("frequency file does not exist: {0}")]
    MissingFile(PathBuf),
    #[error("could not read frequency file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse frequency file {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlFrequencyEntry {
    single: Option<f64>,
    lo: Option<f64>,
    hi: Option<f64>,
    label: Option<String>,
    #[serde(default, rename = "lockout")]
    locked: bool,
    priority: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FrequencyFile {
    #[serde(default)]
    frequencies: Vec<YamlFrequencyEntry>,
}

impl From<YamlFrequencyEntry> for RawFrequencyEntry {
    fn from(entry: YamlFrequencyEntry) -> Self {
        RawFrequencyEntry {
            single: entry.single,
            lo: entry.lo,
            hi: entry.hi,
            label: entry.label,
            locked: entry.locked,
            priority: entry.priority,
        }
    }
}

/// Read and parse a frequency configuration file into the raw entries the
/// registry expects, in file order. An empty path yields an empty list
/// rather than an error, per §6's "missing file + empty file name" rule.
pub fn load_frequency_file(path: &Path) -> Result<Vec<RawFrequencyEntry>, FrequencyConfigError> {
    if path.as_os_str().is_empty() {
        return Ok(Vec::new());
    }
    if !path.exists() {
        return Err(FrequencyConfigError::MissingFile(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), "loading frequency configuration");
    let contents = std::fs::read_to_string(path)
        .map_err(|source| FrequencyConfigError::Read { path: path.to_path_buf(), source })?;

    let parsed: FrequencyFile = serde_yaml::from_str(&contents)
        .map_err(|source| FrequencyConfigError::Parse { path: path.to_path_buf(), source })?;

    Ok(parsed.frequencies.into_iter().map(RawFrequencyEntry::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_frequency_file(Path::new("/nonexistent/frequencies.yaml")).unwrap_err();
        assert!(matches!(err, FrequencyConfigError::MissingFile(_)));
    }

    #[test]
    fn loads_singles_and_ranges_in_order() {
        let file = write_temp(
            r#"
frequencies:
  - single: 146.52
    label: "calling"
    priority: 1
  - lo: 450.0
    hi: 460.0
    lockout: true
"#,
        );
        let entries = load_frequency_file(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].single, Some(146.52));
        assert_eq!(entries[0].priority, Some(1));
        assert_eq!(entries[1].lo, Some(450.0));
        assert!(entries[1].locked);
    }

    #[test]
    fn empty_file_yields_no_entries() {
        let file = write_temp("frequencies: []\n");
        let entries = load_frequency_file(file.path()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn empty_path_yields_no_entries_without_touching_disk() {
        let entries = load_frequency_file(Path::new("")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let file = write_temp("frequencies: [this is not valid\n");
        let err = load_frequency_file(file.path()).unwrap_err();
        assert!(matches!(err, FrequencyConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let file = write_temp(
            r#"
frequencies:
  - single: 146.52
    bogus: true
"#,
        );
        let err = load_frequency_file(file.path()).unwrap_err();
        assert!(matches!(err, FrequencyConfigError::Parse { .. }));
    }
}
