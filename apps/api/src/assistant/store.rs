//! Section Store: per-session accumulator of resume content.
//!
//! Every section is always present as a key. Repeatable sections append,
//! singleton sections replace. Nothing is ever removed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::assistant::sections::{Cardinality, Section, SectionLayout};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SectionContent {
    Entries(Vec<String>),
    Value(Option<String>),
}

impl SectionContent {
    fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Repeatable => SectionContent::Entries(Vec::new()),
            Cardinality::Singleton => SectionContent::Value(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SectionContent::Entries(entries) => entries.is_empty(),
            SectionContent::Value(value) => value.is_none(),
        }
    }

    /// The individual pieces of content, in accumulation order.
    pub fn items(&self) -> Vec<&str> {
        match self {
            SectionContent::Entries(entries) => entries.iter().map(String::as_str).collect(),
            SectionContent::Value(value) => value.as_deref().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionStore {
    layout: SectionLayout,
    sections: BTreeMap<Section, SectionContent>,
}

impl SectionStore {
    pub fn new(layout: SectionLayout) -> Self {
        let sections = Section::CANONICAL_ORDER
            .into_iter()
            .map(|section| (section, SectionContent::empty(layout.cardinality(section))))
            .collect();
        Self { layout, sections }
    }

    /// Applies one update. Blank content is ignored and reported as `false`.
    pub fn update(&mut self, section: Section, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() {
            return false;
        }

        let cardinality = self.layout.cardinality(section);
        let slot = self
            .sections
            .entry(section)
            .or_insert_with(|| SectionContent::empty(cardinality));

        match slot {
            SectionContent::Entries(entries) => entries.push(content.to_string()),
            SectionContent::Value(value) => *value = Some(content.to_string()),
        }
        true
    }

    pub fn get(&self, section: Section) -> &SectionContent {
        // Every section is inserted in `new`; the map never shrinks.
        &self.sections[&section]
    }

    pub fn get_all(&self) -> &BTreeMap<Section, SectionContent> {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(SectionContent::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_every_section_empty() {
        let store = SectionStore::new(SectionLayout::default());
        assert_eq!(store.get_all().len(), Section::CANONICAL_ORDER.len());
        assert!(store.is_empty());
        assert_eq!(store.get(Section::Summary), &SectionContent::Value(None));
        assert_eq!(store.get(Section::Skills), &SectionContent::Entries(vec![]));
    }

    #[test]
    fn test_repeatable_section_keeps_every_non_empty_update_in_order() {
        let mut store = SectionStore::new(SectionLayout::default());
        let updates = ["Acme, 2019-2021", "", "  ", "Globex, 2021-now", "Initech"];
        let applied = updates
            .iter()
            .filter(|u| store.update(Section::Experience, u))
            .count();

        assert_eq!(applied, 3);
        assert_eq!(
            store.get(Section::Experience).items(),
            vec!["Acme, 2019-2021", "Globex, 2021-now", "Initech"]
        );
    }

    #[test]
    fn test_singleton_section_replaces() {
        let mut store = SectionStore::new(SectionLayout::default());
        store.update(Section::Summary, "First draft");
        store.update(Section::Summary, "Second draft");
        assert_eq!(
            store.get(Section::Summary),
            &SectionContent::Value(Some("Second draft".to_string()))
        );
    }

    #[test]
    fn test_blank_update_on_singleton_keeps_previous_value() {
        let mut store = SectionStore::new(SectionLayout::default());
        store.update(Section::Summary, "Kept");
        assert!(!store.update(Section::Summary, "   "));
        assert_eq!(store.get(Section::Summary).items(), vec!["Kept"]);
    }

    #[test]
    fn test_layout_decides_skills_cardinality() {
        let mut listed = SectionStore::new(SectionLayout::default());
        listed.update(Section::Skills, "Python, Go");
        listed.update(Section::Skills, "Rust");
        assert_eq!(listed.get(Section::Skills).items(), vec!["Python, Go", "Rust"]);

        let mut scalar = SectionStore::new(SectionLayout::with_singletons([Section::Skills]));
        scalar.update(Section::Skills, "Python, Go");
        scalar.update(Section::Skills, "Rust");
        assert_eq!(scalar.get(Section::Skills).items(), vec!["Rust"]);
    }

    #[test]
    fn test_get_all_serializes_with_section_keys() {
        let mut store = SectionStore::new(SectionLayout::default());
        store.update(Section::Skills, "Rust");
        let json = serde_json::to_value(store.get_all()).unwrap();
        assert_eq!(json["skills"], serde_json::json!(["Rust"]));
        assert_eq!(json["summary"], serde_json::Value::Null);
    }
}
