//! Unit and Dataset types
//!
//! Both are build-once values: a Unit is produced by one worker, a Dataset by the
//! aggregator after every worker has returned. Maps are ordered so serialization is
//! deterministic regardless of the order results arrived in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::meeting::Meeting;
use crate::schema;

/// Courses of one organizational unit, keyed by canonical course name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit {
    pub courses: BTreeMap<String, Vec<Meeting>>,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Meetings of a course, if the course exists.
    pub fn course(&self, name: &str) -> Option<&[Meeting]> {
        self.courses.get(name).map(Vec::as_slice)
    }

    /// Ensure a course key exists and return its meeting list.
    pub fn course_entry(&mut self, name: &str) -> &mut Vec<Meeting> {
        self.courses.entry(name.to_string()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Total number of meetings across all courses.
    pub fn meeting_count(&self) -> usize {
        self.courses.values().map(Vec::len).sum()
    }
}

/// Everything scraped for one term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub term: String,
    pub units: BTreeMap<String, Unit>,
}

impl Dataset {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            units: BTreeMap::new(),
        }
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn course_count(&self) -> usize {
        self.units.values().map(Unit::len).sum()
    }

    /// Find a course by exact canonical name.
    ///
    /// The unit whose id matches the course's leading letters is searched first,
    /// then every unit in key order. Returns `(unit_id, meetings)`.
    pub fn find_course(&self, name: &str) -> Option<(&str, &[Meeting])> {
        let prefix = schema::course_prefix(name);
        if !prefix.is_empty() {
            let preferred = self
                .units
                .iter()
                .find(|(id, _)| id.eq_ignore_ascii_case(&prefix))
                .and_then(|(id, unit)| unit.course(name).map(|m| (id.as_str(), m)));
            if preferred.is_some() {
                return preferred;
            }
        }

        self.units
            .iter()
            .find_map(|(id, unit)| unit.course(name).map(|m| (id.as_str(), m)))
    }
}
