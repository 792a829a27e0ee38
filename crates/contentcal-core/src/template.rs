//! Content calendar template.
//!
//! [`build`] turns validated inputs into a [`CalendarSpec`]: the column
//! layout, dropdown lists, sample and planning rows, and the text of the
//! instructions sheet. Nothing here performs I/O, and the start date is an
//! explicit input, so identical inputs always produce identical output.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::validate::{ClientName, Weeks};

/// Title of the sheet holding the calendar itself.
pub const CALENDAR_SHEET_TITLE: &str = "Content Calendar";

/// Title of the sheet holding the instructions.
pub const INSTRUCTIONS_SHEET_TITLE: &str = "Instructions";

/// Last row covered by dropdown validation, leaving room for future entries.
pub const VALIDATION_LAST_ROW: u32 = 1000;

/// Status given to every generated planning row.
pub const PLANNED_STATUS: &str = "Planned";

/// Platforms offered in the Platform dropdown.
pub const PLATFORMS: &[&str] = &[
    "LinkedIn",
    "Facebook",
    "Instagram",
    "Twitter",
    "TikTok",
    "YouTube",
    "Blog",
    "Email",
];

/// Formats offered in the Content Type dropdown.
pub const CONTENT_TYPES: &[&str] = &[
    "Image Post",
    "Video",
    "Carousel",
    "Story",
    "Text Post",
    "Reel",
    "Live Stream",
    "Poll",
];

/// Workflow states offered in the Status dropdown.
pub const STATUSES: &[&str] = &[
    "Planned",
    "Draft",
    "In Review",
    "Approved",
    "Scheduled",
    "Published",
    "Cancelled",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single row of cell values.
pub type Row = Vec<String>;

/// One column of the calendar sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Header text.
    pub name: String,
    /// Column width in pixels.
    pub width_px: u32,
    /// Allowed values, when the column is restricted to a dropdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropdown: Option<Vec<String>>,
}

impl ColumnDef {
    fn plain(name: &str, width_px: u32) -> Self {
        Self {
            name: name.to_string(),
            width_px,
            dropdown: None,
        }
    }

    fn dropdown(name: &str, width_px: u32, options: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            width_px,
            dropdown: Some(options.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// How an instructions line is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    /// The sheet title, rendered as a banner.
    Title,
    /// A section heading, rendered bold.
    Heading,
    /// Regular text.
    Body,
    /// An empty spacer row.
    Blank,
}

/// A line on the instructions sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionLine {
    pub style: LineStyle,
    /// First-column text.
    pub label: String,
    /// Optional second-column text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl InstructionLine {
    fn title(label: &str) -> Self {
        Self {
            style: LineStyle::Title,
            label: label.to_string(),
            detail: None,
        }
    }

    fn heading(label: &str) -> Self {
        Self {
            style: LineStyle::Heading,
            label: label.to_string(),
            detail: None,
        }
    }

    fn body(label: &str) -> Self {
        Self {
            style: LineStyle::Body,
            label: label.to_string(),
            detail: None,
        }
    }

    fn field(label: &str, detail: &str) -> Self {
        Self {
            style: LineStyle::Body,
            label: label.to_string(),
            detail: Some(detail.to_string()),
        }
    }

    fn blank() -> Self {
        Self {
            style: LineStyle::Blank,
            label: String::new(),
            detail: None,
        }
    }
}

/// Everything needed to populate a content calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSpec {
    /// Spreadsheet title.
    pub title: String,
    pub client_name: ClientName,
    pub weeks: Weeks,
    /// Date of the first row.
    pub start_date: NaiveDate,
    pub columns: Vec<ColumnDef>,
    /// Filled-in example rows.
    pub sample_rows: Vec<Row>,
    /// Date-only rows for the rest of the planning horizon.
    pub planning_rows: Vec<Row>,
    pub instructions: Vec<InstructionLine>,
}

impl CalendarSpec {
    /// Header row.
    pub fn headers(&self) -> Row {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Sample rows followed by planning rows, in sheet order.
    pub fn data_rows(&self) -> Vec<Row> {
        self.sample_rows
            .iter()
            .chain(self.planning_rows.iter())
            .cloned()
            .collect()
    }

    /// Zero-based indices and option lists of the dropdown columns.
    pub fn dropdown_columns(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.dropdown.as_deref().map(|opts| (i, opts)))
    }

    /// Instructions as two-column rows (label, detail).
    pub fn instruction_rows(&self) -> Vec<Row> {
        self.instructions
            .iter()
            .map(|line| {
                vec![
                    line.label.clone(),
                    line.detail.clone().unwrap_or_default(),
                ]
            })
            .collect()
    }

    /// Instructions as plain text, one line per row.
    pub fn instructions_text(&self) -> String {
        self.instructions
            .iter()
            .map(|line| match &line.detail {
                Some(detail) => format!("{}: {}", line.label, detail),
                None => line.label.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pretty JSON rendering, used for dry runs.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds the calendar for a client.
pub fn build(client_name: &ClientName, weeks: Weeks, start_date: NaiveDate) -> CalendarSpec {
    let sample_rows = sample_rows(start_date);
    let planning_rows = planning_rows(start_date, sample_rows.len() as u32, weeks.days());

    CalendarSpec {
        title: format!("{} - Content Calendar", client_name),
        client_name: client_name.clone(),
        weeks,
        start_date,
        columns: columns(),
        sample_rows,
        planning_rows,
        instructions: instructions(),
    }
}

fn columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::plain("Date", 100),
        ColumnDef::plain("Time", 80),
        ColumnDef::dropdown("Platform", 100, PLATFORMS),
        ColumnDef::dropdown("Content Type", 120, CONTENT_TYPES),
        ColumnDef::plain("Post Content", 400),
        ColumnDef::dropdown("Status", 100, STATUSES),
        ColumnDef::plain("Notes", 200),
    ]
}

fn day(start: NaiveDate, offset: u32) -> String {
    (start + Duration::days(i64::from(offset)))
        .format(DATE_FORMAT)
        .to_string()
}

fn row(cells: [&str; 7]) -> Row {
    cells.iter().map(|s| s.to_string()).collect()
}

fn sample_rows(start: NaiveDate) -> Vec<Row> {
    let entries: [(u32, [&str; 6]); 3] = [
        (
            0,
            [
                "09:00",
                "LinkedIn",
                "Image Post",
                "Share industry insights about digital marketing trends...",
                "Draft",
                "Need to add company logo",
            ],
        ),
        (
            1,
            [
                "14:30",
                "Instagram",
                "Story",
                "Behind-the-scenes content from team meeting",
                "Planned",
                "Coordinate with design team",
            ],
        ),
        (
            2,
            [
                "10:15",
                "Facebook",
                "Video",
                "Client testimonial video - case study feature",
                "In Review",
                "Waiting for client approval",
            ],
        ),
    ];

    entries
        .into_iter()
        .map(|(offset, [time, platform, kind, content, status, notes])| {
            let date = day(start, offset);
            row([date.as_str(), time, platform, kind, content, status, notes])
        })
        .collect()
}

fn planning_rows(start: NaiveDate, first_offset: u32, total_days: u32) -> Vec<Row> {
    (first_offset..total_days)
        .map(|offset| {
            let date = day(start, offset);
            row([date.as_str(), "", "", "", "", PLANNED_STATUS, ""])
        })
        .collect()
}

fn instructions() -> Vec<InstructionLine> {
    vec![
        InstructionLine::title("Content Calendar Instructions"),
        InstructionLine::blank(),
        InstructionLine::heading("How to Use This Calendar:"),
        InstructionLine::blank(),
        InstructionLine::field(
            "1. Date & Time",
            "Enter the scheduled publication date and time",
        ),
        InstructionLine::field(
            "2. Platform",
            "Select from the dropdown: LinkedIn, Facebook, Instagram, etc.",
        ),
        InstructionLine::field(
            "3. Content Type",
            "Choose the format: Image Post, Video, Carousel, Story, etc.",
        ),
        InstructionLine::field(
            "4. Post Content",
            "Write your post text, including hashtags and mentions",
        ),
        InstructionLine::field(
            "5. Status",
            "Track progress: Planned → Draft → In Review → Approved → Scheduled → Published",
        ),
        InstructionLine::field(
            "6. Notes",
            "Add any special instructions, asset needs, or reminders",
        ),
        InstructionLine::blank(),
        InstructionLine::heading("Tips for Success:"),
        InstructionLine::blank(),
        InstructionLine::body("• Plan content 1-2 weeks in advance"),
        InstructionLine::body("• Keep post content concise but engaging"),
        InstructionLine::body("• Use the Notes column for asset requirements"),
        InstructionLine::body("• Update Status as content moves through workflow"),
        InstructionLine::body("• Coordinate with your account team for approvals"),
        InstructionLine::blank(),
        InstructionLine::heading("Content Guidelines:"),
        InstructionLine::blank(),
        InstructionLine::body("• Each platform has different optimal posting times"),
        InstructionLine::body("• Keep Instagram captions under 2,200 characters"),
        InstructionLine::body("• LinkedIn posts perform well with 150-300 words"),
        InstructionLine::body("• Include relevant hashtags for discoverability"),
        InstructionLine::body("• Always include a call-to-action when appropriate"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate_client_name, validate_duration};

    fn acme(weeks: i64) -> CalendarSpec {
        let name = validate_client_name("Acme Co").unwrap();
        let weeks = validate_duration(weeks).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        build(&name, weeks, start)
    }

    #[test]
    fn acme_four_weeks() {
        let spec = acme(4);
        assert_eq!(spec.title, "Acme Co - Content Calendar");
        assert_eq!(spec.columns.len(), 7);
        assert!(!spec.sample_rows.is_empty());
        assert!(!spec.instructions_text().is_empty());
        assert_eq!(spec.data_rows().len(), 28);
    }

    #[test]
    fn headers_snapshot() {
        let spec = acme(4);
        insta::assert_json_snapshot!(spec.headers(), @r#"
        [
          "Date",
          "Time",
          "Platform",
          "Content Type",
          "Post Content",
          "Status",
          "Notes"
        ]
        "#);
    }

    #[test]
    fn first_sample_row_snapshot() {
        let spec = acme(4);
        insta::assert_json_snapshot!(spec.sample_rows[0], @r#"
        [
          "2024-03-15",
          "09:00",
          "LinkedIn",
          "Image Post",
          "Share industry insights about digital marketing trends...",
          "Draft",
          "Need to add company logo"
        ]
        "#);
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(acme(6), acme(6));
        assert_eq!(acme(6).to_json().unwrap(), acme(6).to_json().unwrap());
    }

    #[test]
    fn rows_are_consecutive_days() {
        let spec = acme(2);
        let rows = spec.data_rows();
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[0][0], "2024-03-15");
        assert_eq!(rows[3][0], "2024-03-18");
        assert_eq!(rows[13][0], "2024-03-28");
        assert!(rows.iter().all(|r| r.len() == spec.columns.len()));
    }

    #[test]
    fn planning_rows_are_marked_planned() {
        let spec = acme(1);
        assert_eq!(spec.planning_rows.len(), 4);
        for row in &spec.planning_rows {
            assert_eq!(row[5], PLANNED_STATUS);
            assert!(row[1..5].iter().all(String::is_empty));
        }
    }

    #[test]
    fn sample_values_are_valid_dropdown_choices() {
        let spec = acme(1);
        for (col, options) in spec.dropdown_columns() {
            for row in spec.data_rows() {
                let value = &row[col];
                assert!(
                    value.is_empty() || options.contains(value),
                    "{value:?} is not a valid {} option",
                    spec.columns[col].name
                );
            }
        }
    }

    #[test]
    fn dropdowns_cover_platform_type_and_status() {
        let spec = acme(1);
        let cols: Vec<usize> = spec.dropdown_columns().map(|(i, _)| i).collect();
        assert_eq!(cols, vec![2, 3, 5]);
    }

    #[test]
    fn instructions_have_title_and_headings() {
        let spec = acme(1);
        assert_eq!(spec.instructions[0].style, LineStyle::Title);
        let headings: Vec<&str> = spec
            .instructions
            .iter()
            .filter(|l| l.style == LineStyle::Heading)
            .map(|l| l.label.as_str())
            .collect();
        assert_eq!(
            headings,
            vec![
                "How to Use This Calendar:",
                "Tips for Success:",
                "Content Guidelines:"
            ]
        );
        assert!(spec.instruction_rows().iter().all(|r| r.len() == 2));
    }

    #[test]
    fn json_rendering_contains_title() {
        let json = acme(1).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Acme Co - Content Calendar");
        assert_eq!(value["weeks"], 1);
        assert_eq!(value["start_date"], "2024-03-15");
    }
}
