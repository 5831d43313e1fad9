//! The fixed set of resume sections, their canonical order, and which of them
//! accumulate versus replace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One named part of a resume. Declaration order is the canonical render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    PersonalInfo,
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Achievements,
}

impl Section {
    pub const CANONICAL_ORDER: [Section; 7] = [
        Section::PersonalInfo,
        Section::Summary,
        Section::Experience,
        Section::Education,
        Section::Skills,
        Section::Projects,
        Section::Achievements,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::PersonalInfo => "personal_info",
            Section::Summary => "summary",
            Section::Experience => "experience",
            Section::Education => "education",
            Section::Skills => "skills",
            Section::Projects => "projects",
            Section::Achievements => "achievements",
        }
    }

    /// Heading text used in the rendered document.
    pub fn title(self) -> &'static str {
        match self {
            Section::PersonalInfo => "Personal Information",
            Section::Summary => "Summary",
            Section::Experience => "Experience",
            Section::Education => "Education",
            Section::Skills => "Skills",
            Section::Projects => "Projects",
            Section::Achievements => "Achievements",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown section '{0}'")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Section::CANONICAL_ORDER
            .into_iter()
            .find(|section| section.as_str() == normalized)
            .ok_or_else(|| UnknownSection(s.trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Content accumulates as an ordered list across updates.
    Repeatable,
    /// Content is replaced wholesale on each update.
    Singleton,
}

/// Per-section cardinality. Defaults to personal info and summary as singletons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    cardinality: [Cardinality; 7],
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self::with_singletons([Section::PersonalInfo, Section::Summary])
    }
}

impl SectionLayout {
    pub fn with_singletons(singletons: impl IntoIterator<Item = Section>) -> Self {
        let mut cardinality = [Cardinality::Repeatable; 7];
        for section in singletons {
            cardinality[section.index()] = Cardinality::Singleton;
        }
        Self { cardinality }
    }

    /// Parses a comma-separated list of singleton section names. An empty list
    /// makes every section repeatable.
    pub fn parse(raw: &str) -> Result<Self, UnknownSection> {
        let singletons = raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Section::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_singletons(singletons))
    }

    pub fn cardinality(&self, section: Section) -> Cardinality {
        self.cardinality[section.index()]
    }
}
