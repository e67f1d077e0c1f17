//! Structural checks for the final markdown report.
//!
//! The writer is only prompted to follow the report layout; nothing forces
//! the model to comply. [`check_report`] inspects the result after the fact
//! and lists deviations. It never rewrites or rejects the report.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("invalid heading regex"));
static BOLD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\*\*(.+?)\*\*\s*:?\s*$").expect("invalid bold heading regex"));
static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("invalid citation regex"));
static REFERENCE_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*]\s*)?(?:\[(\d+)\]|(\d+)[.)])\s+").expect("invalid reference regex")
});
static HEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(?\d+[.)]?\s*").expect("invalid heading number regex"));
static ACCESS_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(accessed|retrieved)\b").expect("invalid access date regex"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("invalid image regex"));
static TABLE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)+\|?\s*$").expect("invalid table regex"));

/// Known report sections, in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    ResearchReport,
    ExecutiveSummary,
    KeyFindings,
    Visuals,
    Conclusion,
    References,
    ThinkingProcessSummary,
}

impl Section {
    pub const REQUIRED: [Section; 5] = [
        Section::ResearchReport,
        Section::ExecutiveSummary,
        Section::Conclusion,
        Section::References,
        Section::ThinkingProcessSummary,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::ResearchReport => "Research Report",
            Section::ExecutiveSummary => "Executive Summary",
            Section::KeyFindings => "Key Findings",
            Section::Visuals => "Visuals",
            Section::Conclusion => "Conclusion",
            Section::References => "References",
            Section::ThinkingProcessSummary => "Thinking Process Summary",
        }
    }

    fn from_heading(text: &str) -> Option<Section> {
        let normalized = normalize_heading(text);
        [
            Section::ResearchReport,
            Section::ExecutiveSummary,
            Section::KeyFindings,
            Section::Visuals,
            Section::Conclusion,
            Section::References,
            Section::ThinkingProcessSummary,
        ]
        .into_iter()
        .find(|section| normalized.starts_with(&section.title().to_lowercase()))
    }
}

/// One deviation from the report layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportIssue {
    MissingSection { section: Section },
    OutOfOrder { section: Section, after: Section },
    DanglingCitation { index: u32 },
    AccessDateInReference { line: String },
    VisualsWithoutArtifact,
}

impl fmt::Display for ReportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportIssue::MissingSection { section } => {
                write!(f, "required section '{}' is missing", section.title())
            }
            ReportIssue::OutOfOrder { section, after } => write!(
                f,
                "section '{}' appears after '{}'",
                section.title(),
                after.title()
            ),
            ReportIssue::DanglingCitation { index } => {
                write!(f, "citation [{index}] has no matching reference entry")
            }
            ReportIssue::AccessDateInReference { line } => {
                write!(f, "reference carries an access date: {line}")
            }
            ReportIssue::VisualsWithoutArtifact => write!(
                f,
                "Visuals section contains no image, table or diagram"
            ),
        }
    }
}

/// Result of [`check_report`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCheck {
    /// Sections found, in order of first appearance.
    pub sections: Vec<Section>,
    pub issues: Vec<ReportIssue>,
}

impl ReportCheck {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn log_warnings(&self) {
        for issue in &self.issues {
            tracing::warn!(issue = %issue, "report deviates from expected layout");
        }
    }
}

struct Block<'a> {
    section: Option<Section>,
    lines: Vec<&'a str>,
}

/// Inspect a markdown report for layout and citation problems.
pub fn check_report(markdown: &str) -> ReportCheck {
    let blocks = split_sections(markdown);
    let mut check = ReportCheck::default();

    for section in blocks.iter().filter_map(|block| block.section) {
        if !check.sections.contains(&section) {
            check.sections.push(section);
        }
    }

    for required in Section::REQUIRED {
        if !check.sections.contains(&required) {
            check.issues.push(ReportIssue::MissingSection { section: required });
        }
    }

    let mut latest: Option<Section> = None;
    for &section in &check.sections {
        match latest {
            Some(after) if section < after => {
                check.issues.push(ReportIssue::OutOfOrder { section, after });
            }
            _ => latest = Some(section),
        }
    }

    let reference_lines: Vec<&str> = blocks
        .iter()
        .filter(|block| block.section == Some(Section::References))
        .flat_map(|block| block.lines.iter().copied())
        .collect();

    if check.sections.contains(&Section::References) {
        let known = reference_numbers(&reference_lines);
        // Bracketed numbers elsewhere (years, footnotes) are not citations.
        let cited: BTreeSet<u32> = blocks
            .iter()
            .filter(|block| {
                matches!(
                    block.section,
                    Some(Section::KeyFindings | Section::ThinkingProcessSummary)
                )
            })
            .flat_map(|block| block.lines.iter())
            .flat_map(|line| citations(line))
            .collect();
        for index in cited.difference(&known) {
            check
                .issues
                .push(ReportIssue::DanglingCitation { index: *index });
        }
    }

    for line in &reference_lines {
        if REFERENCE_ENTRY.is_match(line) && ACCESS_DATE.is_match(line) {
            check.issues.push(ReportIssue::AccessDateInReference {
                line: line.trim().to_string(),
            });
        }
    }

    let visuals: Vec<&str> = blocks
        .iter()
        .filter(|block| block.section == Some(Section::Visuals))
        .flat_map(|block| block.lines.iter().copied())
        .collect();
    if check.sections.contains(&Section::Visuals) && !has_artifact(&visuals) {
        check.issues.push(ReportIssue::VisualsWithoutArtifact);
    }

    check
}

fn split_sections(markdown: &str) -> Vec<Block<'_>> {
    let mut blocks = vec![Block {
        section: None,
        lines: Vec::new(),
    }];

    for line in markdown.lines() {
        let heading = HEADING
            .captures(line)
            .or_else(|| BOLD_HEADING.captures(line))
            .and_then(|caps| caps.get(1))
            .and_then(|text| Section::from_heading(text.as_str()));

        match heading {
            Some(section) => blocks.push(Block {
                section: Some(section),
                lines: Vec::new(),
            }),
            None => {
                if let Some(current) = blocks.last_mut() {
                    current.lines.push(line);
                }
            }
        }
    }

    blocks
}

fn normalize_heading(text: &str) -> String {
    let text = text.trim().trim_matches('*').trim();
    HEADING_NUMBER.replace(text, "").trim().to_lowercase()
}

fn citations(line: &str) -> Vec<u32> {
    CITATION
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .flat_map(|group| {
            group
                .as_str()
                .split(',')
                .filter_map(|n| n.trim().parse::<u32>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn reference_numbers(lines: &[&str]) -> BTreeSet<u32> {
    lines
        .iter()
        .filter_map(|line| REFERENCE_ENTRY.captures(line))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|n| n.as_str().parse().ok())
        .collect()
}

fn has_artifact(lines: &[&str]) -> bool {
    lines.iter().any(|line| {
        IMAGE.is_match(line) || TABLE_RULE.is_match(line) || line.trim_start().starts_with("```")
    })
}
