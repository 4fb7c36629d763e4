//! Schema contract for the class-schedule pages
//!
//! Everything the scraper assumes about the third-party markup lives here: which
//! elements are content blocks, how a course name is derived from a heading, and
//! which cell position holds which field. A site change should need one edit here.

use scraper::Selector;

use crate::error::{Result, ScrapeError};

/// Content block holding one course's table.
pub const BLOCK_SELECTOR: &str = "div.table";

/// Heading inside a block; its text names the course.
pub const HEADING_SELECTOR: &str = "h2";

/// Rows inside a block. The first one is the column header.
pub const ROW_SELECTOR: &str = "div[role='row']";

/// Links on the term index page.
pub const LINK_SELECTOR: &str = "a[href]";

/// Separates the course code from its title in a heading ("ECON 100A - Intro").
pub const HEADING_SEPARATOR: &str = " - ";

/// Column positions within a data row (direct children of the row element).
pub mod columns {
    pub const DAYS: usize = 3;
    pub const START_TIME: usize = 5;
    pub const END_TIME: usize = 6;
}

/// Rows with fewer cells are malformed. One past the highest position read.
pub const MIN_CELLS: usize = columns::END_TIME + 1;

/// Compiled selectors for the contract above.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub block: Selector,
    pub heading: Selector,
    pub row: Selector,
    pub link: Selector,
}

impl Selectors {
    pub fn compile() -> Result<Self> {
        Ok(Self {
            block: compile(BLOCK_SELECTOR)?,
            heading: compile(HEADING_SELECTOR)?,
            row: compile(ROW_SELECTOR)?,
            link: compile(LINK_SELECTOR)?,
        })
    }
}

/// Compile a CSS selector, mapping failures into the crate error.
pub fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::Schema(format!("{}: {}", selector, e)))
}

/// Canonical course name from heading text.
///
/// Keeps the part before the first separator, removes all whitespace and
/// upper-cases it: `"ECON 100A - Intro"` becomes `"ECON100A"`. Returns `None`
/// when nothing is left.
pub fn course_name(heading: &str) -> Option<String> {
    let code = heading.split(HEADING_SEPARATOR).next().unwrap_or_default();
    let name: String = code.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    if name.is_empty() { None } else { Some(name) }
}

/// Leading alphabetic part of a course name (`"ECON100A"` -> `"ECON"`).
pub fn course_prefix(name: &str) -> String {
    name.chars().take_while(|c| c.is_alphabetic()).collect::<String>().to_uppercase()
}

/// Trim a cell's text and collapse internal whitespace runs to one space.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
