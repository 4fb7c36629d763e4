//! Dataset persistence
//!
//! One JSON document per term under the data directory. Writes go to a temporary
//! file in the same directory and are renamed into place, so readers only ever
//! see a complete previous or complete new document.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::domain::{Dataset, Unit};
use crate::error::{Result, ScrapeError};
use crate::report::RunReport;

const DATASET_EXT: &str = "json";
const REPORT_SUFFIX: &str = ".report.json";
const UNITS_SUFFIX: &str = "-units.json";

/// Term-keyed store of datasets, run reports and unit lists.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dataset_path(&self, term: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", term, DATASET_EXT))
    }

    pub fn report_path(&self, term: &str) -> PathBuf {
        self.dir.join(format!("{}{}", term, REPORT_SUFFIX))
    }

    pub fn units_path(&self, term: &str) -> PathBuf {
        self.dir.join(format!("{}{}", term, UNITS_SUFFIX))
    }

    /// Publish `dataset`, replacing any earlier dataset for its term.
    pub fn save(&self, dataset: &Dataset) -> Result<PathBuf> {
        validate_term(&dataset.term)?;
        let path = self.dataset_path(&dataset.term);
        self.write_atomic(&path, &dataset.units)?;
        info!(
            "Saved {} units / {} courses to {}",
            dataset.units.len(),
            dataset.course_count(),
            path.display()
        );
        Ok(path)
    }

    /// Read back the dataset for `term`.
    pub fn load(&self, term: &str) -> Result<Dataset> {
        validate_term(term)?;
        let units: BTreeMap<String, Unit> = self.read(&self.dataset_path(term), term)?;
        Ok(Dataset {
            term: term.to_string(),
            units,
        })
    }

    /// Terms with a persisted dataset, sorted.
    pub fn terms(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut terms = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(REPORT_SUFFIX) || name.ends_with(UNITS_SUFFIX) || name.starts_with('.') {
                continue;
            }
            if let Some(term) = name.strip_suffix(&format!(".{}", DATASET_EXT)) {
                terms.push(term.to_string());
            }
        }
        terms.sort();
        Ok(terms)
    }

    pub fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        validate_term(&report.term)?;
        let path = self.report_path(&report.term);
        self.write_atomic(&path, report)?;
        Ok(path)
    }

    pub fn load_report(&self, term: &str) -> Result<RunReport> {
        validate_term(term)?;
        self.read(&self.report_path(term), term)
    }

    /// Cache the discovered unit list for `term`.
    pub fn save_units(&self, term: &str, units: &[String]) -> Result<PathBuf> {
        validate_term(term)?;
        let path = self.units_path(term);
        self.write_atomic(&path, &units)?;
        Ok(path)
    }

    /// Cached unit list for `term`, if any.
    pub fn load_units(&self, term: &str) -> Result<Option<Vec<String>>> {
        validate_term(term)?;
        match self.read(&self.units_path(term), term) {
            Ok(units) => Ok(Some(units)),
            Err(ScrapeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read<T: DeserializeOwned>(&self, path: &Path, term: &str) -> Result<T> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScrapeError::NotFound(format!("no data for term {} at {}", term, path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn write_atomic<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let persist_err = |what: &str, e: &dyn std::fmt::Display| {
            ScrapeError::Persist(format!("{} {}: {}", what, path.display(), e))
        };

        fs::create_dir_all(&self.dir).map_err(|e| persist_err("create directory for", &e))?;

        // Dropping the temp file on any early return deletes it.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| persist_err("create temp file for", &e))?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut out, value).map_err(|e| persist_err("serialize", &e))?;
            out.write_all(b"\n").map_err(|e| persist_err("write", &e))?;
            out.flush().map_err(|e| persist_err("write", &e))?;
        }
        tmp.as_file().sync_all().map_err(|e| persist_err("sync", &e))?;
        tmp.persist(path).map_err(|e| persist_err("publish", &e.error))?;
        Ok(())
    }
}

/// Terms name files, so they must be a single plain path component.
pub fn validate_term(term: &str) -> Result<()> {
    let bad = term.is_empty()
        || term.starts_with('.')
        || term.contains(['/', '\\'])
        || term.chars().any(char::is_whitespace);
    if bad {
        warn!("Rejected term identifier {:?}", term);
        return Err(ScrapeError::Config(format!("invalid term identifier: {:?}", term)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DaySet, Meeting};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample(term: &str) -> Dataset {
        let mut dataset = Dataset::new(term);
        let mut econ = Unit::new();
        econ.course_entry("ECON100A")
            .push(Meeting::new(DaySet::parse_code("MWF").unwrap(), "10:00", "10:50"));
        econ.course_entry("ECON100A")
            .push(Meeting::new(DaySet::parse_code("TR").unwrap(), "13:00", "14:15"));
        econ.course_entry("ECON1B");
        dataset.units.insert("econ".to_string(), econ);
        dataset.units.insert("chem".to_string(), Unit::new());
        dataset
    }

    fn store() -> (DatasetStore, TempDir) {
        let temp = TempDir::new().unwrap();
        (DatasetStore::new(temp.path().join("schedules")), temp)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (store, _temp) = store();
        let dataset = sample("fall-2024");
        let path = store.save(&dataset).unwrap();
        assert_eq!(path, store.dataset_path("fall-2024"));

        let loaded = store.load("fall-2024").unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_document_shape() {
        let (store, _temp) = store();
        store.save(&sample("fall-2024")).unwrap();
        let raw = fs::read_to_string(store.dataset_path("fall-2024")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["econ"]["ECON100A"][0]["days"], "MWF");
        assert_eq!(json["econ"]["ECON100A"][1]["startTime"], "13:00");
        assert_eq!(json["econ"]["ECON1B"], serde_json::json!([]));
        assert_eq!(json["chem"], serde_json::json!({}));
    }

    #[test]
    fn test_save_replaces_previous_dataset() {
        let (store, _temp) = store();
        store.save(&sample("fall-2024")).unwrap();

        let replacement = Dataset::new("fall-2024");
        store.save(&replacement).unwrap();
        assert_eq!(store.load("fall-2024").unwrap(), replacement);
    }

    #[test]
    fn test_save_is_deterministic() {
        let (store, _temp) = store();
        store.save(&sample("a")).unwrap();
        store.save(&sample("b")).unwrap();
        let a = fs::read(store.dataset_path("a")).unwrap();
        let b = fs::read(store.dataset_path("b")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (store, _temp) = store();
        store.save(&sample("fall-2024")).unwrap();
        let entries: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_load_missing_term() {
        let (store, _temp) = store();
        assert!(matches!(store.load("spring-2030"), Err(ScrapeError::NotFound(_))));
    }

    #[test]
    fn test_terms_ignore_reports_and_unit_lists() {
        let (store, _temp) = store();
        assert!(store.terms().unwrap().is_empty());
        store.save(&sample("spring-2024")).unwrap();
        store.save(&sample("fall-2024")).unwrap();
        store.save_units("fall-2024", &["econ".to_string()]).unwrap();
        store.save_report(&RunReport::new("fall-2024", 2, Utc::now())).unwrap();

        assert_eq!(store.terms().unwrap(), vec!["fall-2024".to_string(), "spring-2024".to_string()]);
    }

    #[test]
    fn test_unit_cache() {
        let (store, _temp) = store();
        assert_eq!(store.load_units("fall-2024").unwrap(), None);
        let units = vec!["econ".to_string(), "chem".to_string()];
        store.save_units("fall-2024", &units).unwrap();
        assert_eq!(store.load_units("fall-2024").unwrap(), Some(units));
    }

    #[test]
    fn test_report_round_trip() {
        let (store, _temp) = store();
        let report = RunReport::new("fall-2024", 4, Utc::now());
        store.save_report(&report).unwrap();
        assert_eq!(store.load_report("fall-2024").unwrap(), report);
    }

    #[test]
    fn test_invalid_terms_rejected() {
        for term in ["", "../etc", "a/b", ".hidden", "fall 2024"] {
            assert!(validate_term(term).is_err(), "{:?} should be rejected", term);
        }
        assert!(validate_term("fall-2024").is_ok());
    }

    #[test]
    fn test_unwritable_dir_is_persist_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let store = DatasetStore::new(blocker.join("schedules"));
        assert!(matches!(store.save(&sample("fall-2024")), Err(ScrapeError::Persist(_))));
    }

    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(<S::Error as serde::ser::Error>::custom("refused"))
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_dataset() {
        let (store, _temp) = store();
        let original = sample("fall-2024");
        store.save(&original).unwrap();

        let path = store.dataset_path("fall-2024");
        assert!(matches!(store.write_atomic(&path, &Refuses), Err(ScrapeError::Persist(_))));

        assert_eq!(store.load("fall-2024").unwrap(), original);
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_rename_keeps_other_data_and_no_temp_files() {
        let (store, _temp) = store();
        let original = sample("fall-2024");
        store.save(&original).unwrap();

        // A non-empty directory where the dataset file should go cannot be replaced.
        let blocked = store.dataset_path("spring-2025");
        fs::create_dir_all(blocked.join("keep")).unwrap();
        assert!(matches!(store.save(&sample("spring-2025")), Err(ScrapeError::Persist(_))));

        assert_eq!(store.load("fall-2024").unwrap(), original);
        let names: Vec<String> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected entries: {:?}", names);
    }
}
