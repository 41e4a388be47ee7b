//! Lead qualification: pure inference of sales-readiness signals.
//!
//! Nothing in this module performs I/O. The pipeline feeds it the inbound
//! text plus the contact's current flags and persists whatever comes back.

pub mod engine;
pub mod phrases;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use engine::infer;

/// Score at or above which a contact counts as qualified.
pub const QUALIFIED_THRESHOLD: u8 = 3;

/// Service categories a contact may express interest in.
///
/// Declaration order is the detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Harmonization,
    Botox,
    Filler,
    SkinCare,
    LaserHairRemoval,
    Consultation,
}

impl ServiceCategory {
    /// All categories, in detection priority order.
    pub const ALL: [ServiceCategory; 6] = [
        ServiceCategory::Harmonization,
        ServiceCategory::Botox,
        ServiceCategory::Filler,
        ServiceCategory::SkinCare,
        ServiceCategory::LaserHairRemoval,
        ServiceCategory::Consultation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harmonization => "harmonization",
            Self::Botox => "botox",
            Self::Filler => "filler",
            Self::SkinCare => "skin_care",
            Self::LaserHairRemoval => "laser_hair_removal",
            Self::Consultation => "consultation",
        }
    }

    /// Human-readable label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Harmonization => "harmonização facial",
            Self::Botox => "toxina botulínica (botox)",
            Self::Filler => "preenchimento",
            Self::SkinCare => "limpeza de pele / skincare",
            Self::LaserHairRemoval => "depilação a laser",
            Self::Consultation => "consulta de avaliação",
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown service category: '{s}'"))
    }
}

/// Derived qualification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationStatus {
    NotQualified,
    #[default]
    Pending,
    Qualified,
}

impl QualificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotQualified => "not_qualified",
            Self::Pending => "pending",
            Self::Qualified => "qualified",
        }
    }
}

impl fmt::Display for QualificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_qualified" => Ok(Self::NotQualified),
            "pending" => Ok(Self::Pending),
            "qualified" => Ok(Self::Qualified),
            other => Err(format!("unknown qualification status: '{other}'")),
        }
    }
}

/// The four boolean qualification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualificationFlags {
    pub has_budget: bool,
    pub has_urgency: bool,
    pub is_local: bool,
    pub interested_in_appointment: bool,
}

impl QualificationFlags {
    /// Number of flags set, 0 through 4.
    pub fn score(&self) -> u8 {
        [
            self.has_budget,
            self.has_urgency,
            self.is_local,
            self.interested_in_appointment,
        ]
        .into_iter()
        .filter(|f| *f)
        .count() as u8
    }

    /// Score and status after merging a sparse update into these flags.
    ///
    /// Absent fields keep their current value; present fields are only ever
    /// `true`, so merging never clears a flag.
    pub fn merged(&self, update: &QualificationUpdate) -> QualificationFlags {
        QualificationFlags {
            has_budget: self.has_budget || update.has_budget.unwrap_or(false),
            has_urgency: self.has_urgency || update.has_urgency.unwrap_or(false),
            is_local: self.is_local || update.is_local.unwrap_or(false),
            interested_in_appointment: self.interested_in_appointment
                || update.interested_in_appointment.unwrap_or(false),
        }
    }
}

/// Current qualification state of a contact, as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualificationState {
    pub flags: QualificationFlags,
    pub preferred_service: Option<ServiceCategory>,
}

/// Sparse qualification update.
///
/// `None` means "no new evidence"; the engine never produces `Some(false)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QualificationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_budget: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_urgency: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_local: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interested_in_appointment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_service: Option<ServiceCategory>,
}

impl QualificationUpdate {
    pub fn is_empty(&self) -> bool {
        self.has_budget.is_none()
            && self.has_urgency.is_none()
            && self.is_local.is_none()
            && self.interested_in_appointment.is_none()
            && self.preferred_service.is_none()
    }
}

/// Score for the given flags.
pub fn score(flags: &QualificationFlags) -> u8 {
    flags.score()
}

/// Status for the given score.
pub fn status(score: u8) -> QualificationStatus {
    match score {
        0 => QualificationStatus::NotQualified,
        s if s < QUALIFIED_THRESHOLD => QualificationStatus::Pending,
        _ => QualificationStatus::Qualified,
    }
}

/// Score and status together.
pub fn evaluate(flags: &QualificationFlags) -> (u8, QualificationStatus) {
    let s = score(flags);
    (s, status(s))
}
