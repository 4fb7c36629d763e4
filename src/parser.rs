//! Table parser: loaded document -> course meetings
//!
//! Walks every content block, names the course from the block heading and reads
//! each data row through the column contract in [`crate::schema`]. Bad rows are
//! skipped and reported; they never fail the unit.

use log::{debug, warn};
use scraper::{ElementRef, Html};

use crate::domain::{DaySet, Meeting, Unit};
use crate::error::{Result, ScrapeError};
use crate::report::RowIssue;
use crate::schema::{self, Selectors, columns};

/// Output of parsing one unit page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub unit: Unit,
    pub skipped: Vec<RowIssue>,
}

/// Parses class-schedule markup.
#[derive(Debug, Clone)]
pub struct TableParser {
    selectors: Selectors,
}

impl TableParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: Selectors::compile()?,
        })
    }

    /// Whether `html` contains at least one element matching `selector`.
    pub fn contains(html: &str, selector: &scraper::Selector) -> bool {
        Html::parse_document(html).select(selector).next().is_some()
    }

    /// Parse a unit page.
    pub fn parse(&self, unit_id: &str, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);
        let mut page = ParsedPage::default();

        for block in document.select(&self.selectors.block) {
            let course = block
                .select(&self.selectors.heading)
                .next()
                .and_then(|h| schema::course_name(&h.text().collect::<String>()));

            // Header row is dropped.
            let rows: Vec<ElementRef> = block.select(&self.selectors.row).skip(1).collect();

            let Some(course) = course else {
                for (i, _) in rows.iter().enumerate() {
                    page.skipped.push(RowIssue {
                        unit: unit_id.to_string(),
                        course: None,
                        row: i + 1,
                        reason: "no course heading for block".to_string(),
                    });
                }
                if !rows.is_empty() {
                    debug!("{}: skipped {} rows under a block without heading", unit_id, rows.len());
                }
                continue;
            };

            let mut meetings = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                match read_row(&course, i + 1, *row) {
                    Ok(meeting) => meetings.push(meeting),
                    Err(e) => {
                        warn!("{}: {}", unit_id, e);
                        page.skipped.push(RowIssue {
                            unit: unit_id.to_string(),
                            course: Some(course.clone()),
                            row: i + 1,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            page.unit.course_entry(&course).extend(meetings);
        }

        debug!(
            "{}: parsed {} courses, {} meetings, {} skipped rows",
            unit_id,
            page.unit.len(),
            page.unit.meeting_count(),
            page.skipped.len()
        );
        page
    }

    /// Unit identifiers linked from a term index page, in document order, de-duplicated.
    ///
    /// A link counts when its path contains `path_prefix`; the unit id is the
    /// trailing non-empty path segment after that prefix.
    pub fn unit_links(&self, html: &str, path_prefix: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = std::collections::HashSet::new();
        let mut units = Vec::new();

        for link in document.select(&self.selectors.link) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if let Some(unit) = unit_from_href(href, path_prefix) {
                if seen.insert(unit.clone()) {
                    units.push(unit);
                }
            }
        }
        units
    }
}

/// Direct child elements of a row, cleaned.
fn cells(row: ElementRef) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .map(|cell| schema::clean_text(&cell.text().collect::<String>()))
        .collect()
}

fn read_row(course: &str, index: usize, row: ElementRef) -> Result<Meeting> {
    let malformed = |reason: String| ScrapeError::MalformedRow {
        course: course.to_string(),
        row: index,
        reason,
    };

    let cells = cells(row);
    if cells.len() < schema::MIN_CELLS {
        return Err(malformed(format!("{} cells, need {}", cells.len(), schema::MIN_CELLS)));
    }

    let code = &cells[columns::DAYS];
    let days = DaySet::parse_code(code).ok_or_else(|| malformed(format!("unknown day code {:?}", code)))?;

    Ok(Meeting::new(
        days,
        cells[columns::START_TIME].clone(),
        cells[columns::END_TIME].clone(),
    ))
}

fn unit_from_href(href: &str, path_prefix: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let start = path.find(path_prefix)? + path_prefix.len();
    let unit = path[start..].trim_end_matches('/').rsplit('/').next()?;
    if unit.is_empty() { None } else { Some(unit.to_string()) }
}
