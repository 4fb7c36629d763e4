//! Domain types for slotscrape
//!
//! - Meeting: one recurring timeslot (day set + display times)
//! - Unit: course name -> ordered meeting list for one organizational unit
//! - Dataset: term-scoped mapping of unit id -> Unit, the persisted entity

pub mod dataset;
pub mod meeting;

pub use dataset::{Dataset, Unit};
pub use meeting::{DaySet, Meeting, Weekday};
