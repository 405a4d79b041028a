use serde::{Deserialize, Serialize};
use std::fmt;

pub mod record;

pub use record::{CellRef, Column, ColumnKind, CompositeKey, Field, MergedRecord, Record, RowView, ScoreRecord, Sourced};

/// The systems that can supply score rows, listed from lowest to highest merge priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The national admissions portal
    Portal,
    /// A provincial examination authority
    Provincial,
    /// A published third-party dataset
    ThirdParty,
}

impl DataSource {
    pub fn id(&self) -> &'static str {
        match self {
            DataSource::Portal => "portal",
            DataSource::Provincial => "provincial",
            DataSource::ThirdParty => "third_party",
        }
    }

    /// Display label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Portal => "阳光高考",
            DataSource::Provincial => "省级考试院",
            DataSource::ThirdParty => "第三方数据",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.label())
    }
}

/// Entry of the portal's school catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct School {
    pub name: String,
    pub location: String,
    pub level: String,
    pub category: String,
}

/// Entry of the portal's major catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Major {
    pub name: String,
    pub code: String,
    pub category: String,
    pub intro: String,
    pub career: String,
}

/// Sections of a school's admission-rule document; empty when not found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionRules {
    pub body_check: String,
    pub subject_scores: String,
    pub bonus_policies: String,
    pub admission_rules: String,
    pub special_requirements: String,
}

impl AdmissionRules {
    /// Number of sections that were found in the document
    pub fn sections_found(&self) -> usize {
        [
            &self.body_check,
            &self.subject_scores,
            &self.bonus_policies,
            &self.admission_rules,
            &self.special_requirements,
        ]
        .iter()
        .filter(|section| !section.is_empty())
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.sections_found() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRuleEntry {
    pub school_id: u32,
    pub rules: AdmissionRules,
}

/// Document text extracted upstream, not yet split into sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRuleText {
    pub school_id: u32,
    pub text: String,
}

/// Everything the portal collector hands over for one run.
///
/// Sections stay untyped so one malformed entry cannot fail the whole
/// harvest; entries are checked against `School`, `Major`,
/// `AdmissionRuleEntry` and `AdmissionRuleText` one at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalHarvest {
    pub schools: Vec<serde_json::Value>,
    pub majors: Vec<serde_json::Value>,
    pub scores: Vec<serde_json::Value>,
    pub admission_rules: Vec<serde_json::Value>,
    pub admission_rule_texts: Vec<serde_json::Value>,
}
