//! Qualification inference.
//!
//! Each criterion compiles its phrase list once into a single
//! case-insensitive alternation of escaped literals, so a match is exactly
//! "some phrase occurs as a substring, ignoring case".

use std::sync::LazyLock;

use regex::Regex;

use super::phrases;
use super::{QualificationState, QualificationUpdate, ServiceCategory};

/// A fixed phrase list compiled to one case-insensitive regex.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    regex: Regex,
}

impl PhraseMatcher {
    pub fn new(phrases: &[&str]) -> Self {
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!("(?i)(?:{alternation})"))
            .expect("escaped literal alternation always compiles");
        Self { regex }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

static BUDGET: LazyLock<PhraseMatcher> = LazyLock::new(|| PhraseMatcher::new(phrases::BUDGET));
static URGENCY: LazyLock<PhraseMatcher> = LazyLock::new(|| PhraseMatcher::new(phrases::URGENCY));
static LOCALITY: LazyLock<PhraseMatcher> =
    LazyLock::new(|| PhraseMatcher::new(phrases::LOCALITY));
static APPOINTMENT: LazyLock<PhraseMatcher> =
    LazyLock::new(|| PhraseMatcher::new(phrases::APPOINTMENT));
static SERVICES: LazyLock<Vec<(ServiceCategory, PhraseMatcher)>> = LazyLock::new(|| {
    phrases::SERVICES
        .iter()
        .map(|(category, list)| (*category, PhraseMatcher::new(list)))
        .collect()
});

/// Infer new qualification evidence from one inbound message.
///
/// Criteria already true are not evaluated, and a preferred service is only
/// detected while none is recorded. The result holds only new evidence.
pub fn infer(message: &str, current: &QualificationState) -> QualificationUpdate {
    let flags = &current.flags;
    let mut update = QualificationUpdate::default();

    if !flags.has_budget && BUDGET.is_match(message) {
        update.has_budget = Some(true);
    }
    if !flags.has_urgency && URGENCY.is_match(message) {
        update.has_urgency = Some(true);
    }
    if !flags.is_local && LOCALITY.is_match(message) {
        update.is_local = Some(true);
    }
    if !flags.interested_in_appointment && APPOINTMENT.is_match(message) {
        update.interested_in_appointment = Some(true);
    }
    if current.preferred_service.is_none() {
        update.preferred_service = detect_service(message);
    }

    update
}

/// First service category, in priority order, with a matching phrase.
pub fn detect_service(message: &str) -> Option<ServiceCategory> {
    SERVICES
        .iter()
        .find(|(_, matcher)| matcher.is_match(message))
        .map(|(category, _)| *category)
}
