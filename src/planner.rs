//! Schedule planning hand-off
//!
//! Pulls the timetables for a set of required courses out of a [`Dataset`] and
//! packages them into a completion request. Picking the non-overlapping
//! combination is the completion endpoint's job; its answer is returned as-is.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::Serialize;

use crate::domain::{Dataset, Meeting};
use crate::error::{Result, ScrapeError};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::schema;

const SCHEDULER_INSTRUCTIONS: &str = "You are a scheduler. You make college schedules. When you are told a list \
of classes and their days and hours, you find a combination of the possible timeslots avoiding any overlap. \
For each class, return one and only one timeslot.";

/// Meetings for the required courses that exist in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timetables {
    pub found: BTreeMap<String, Vec<Meeting>>,
    /// Requested names with no matching course, in request order.
    pub missing: Vec<String>,
}

impl Timetables {
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

/// Look up each requirement by canonical course name.
///
/// `"econ 100a"` and `"ECON100A"` name the same course and are only counted once.
pub fn timetables(dataset: &Dataset, requirements: &[String]) -> Timetables {
    let mut result = Timetables::default();

    for requirement in requirements {
        let Some(name) = schema::course_name(requirement) else {
            warn!("Ignoring blank course requirement");
            continue;
        };
        if result.found.contains_key(&name) || result.missing.contains(&name) {
            continue;
        }

        match dataset.find_course(&name) {
            Some((unit, meetings)) => {
                info!("Found {} in {} with {} meetings", name, unit, meetings.len());
                result.found.insert(name, meetings.to_vec());
            }
            None => {
                warn!("No timetable found for requirement: {}", requirement);
                result.missing.push(name);
            }
        }
    }

    result
}

/// Build the completion request for `timetables`.
pub fn build_request(timetables: &Timetables, max_tokens: u32) -> Result<CompletionRequest> {
    let listing = serde_json::to_string_pretty(&timetables.found)?;
    let count = timetables.found.len();

    let prompt = format!(
        "From this list of classes, pick a non-overlapping combination of timeslots. \
All classes need to be taken strictly once.\n\n\
You will respond with a possible schedule including {count} classes, no more, no less.\n\n\
The list is:\n{listing}\n"
    );

    Ok(CompletionRequest::new(SCHEDULER_INSTRUCTIONS)
        .with_user_message(prompt)
        .with_max_tokens(max_tokens))
}

/// Ask `client` for a schedule covering `timetables`.
pub async fn plan(client: &dyn CompletionClient, timetables: &Timetables, max_tokens: u32) -> Result<String> {
    if timetables.is_empty() {
        return Err(ScrapeError::NotFound("none of the requested courses are in the dataset".to_string()));
    }

    let request = build_request(timetables, max_tokens)?;
    info!("Requesting schedule for {} courses from {}", timetables.found.len(), client.model());
    let response = client.complete(request).await?;
    Ok(response.content)
}
