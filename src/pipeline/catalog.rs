use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::{AdmissionRuleEntry, AdmissionRuleText, Major, PortalHarvest, School};
use crate::error::GaokaoError;
use crate::pipeline::batch::RejectedRow;
use crate::pipeline::rules::extract_rule_entries;

/// Entry check for one section of the portal harvest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogLog {
    pub section: &'static str,
    pub entries_read: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Portal catalogs with malformed entries set aside
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckedCatalogs {
    /// Accepted school entries as harvested
    pub schools: Vec<Value>,
    /// Accepted major entries as harvested
    pub majors: Vec<Value>,
    /// Pre-split rule entries followed by those extracted from rule texts
    pub admission_rules: Vec<AdmissionRuleEntry>,
    pub logs: Vec<CatalogLog>,
}

impl CheckedCatalogs {
    pub fn entries_rejected(&self) -> usize {
        self.logs.iter().map(|log| log.rejected.len()).sum()
    }
}

/// Convert each entry of a section on its own, keeping the ones that fit `T`
pub fn typed_entries<'a, T: DeserializeOwned>(
    section: &'static str,
    values: &'a [Value],
) -> (Vec<(&'a Value, T)>, CatalogLog) {
    let mut accepted = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();

    for (index, value) in values.iter().enumerate() {
        match T::deserialize(value) {
            Ok(entry) => accepted.push((value, entry)),
            Err(e) => rejected.push(RejectedRow {
                index,
                reason: GaokaoError::ParseFailure {
                    context: format!("{} entry {}", section, index),
                    reason: e.to_string(),
                }
                .to_string(),
            }),
        }
    }

    if !rejected.is_empty() {
        warn!("{} of {} {} entries could not be parsed", rejected.len(), values.len(), section);
    }
    let log = CatalogLog {
        section,
        entries_read: values.len(),
        rejected,
    };
    (accepted, log)
}

/// Check every catalog section of a harvest and split the rule texts
pub fn check_catalogs(harvest: &PortalHarvest) -> CheckedCatalogs {
    let (schools, schools_log) = typed_entries::<School>("schools", &harvest.schools);
    let (majors, majors_log) = typed_entries::<Major>("majors", &harvest.majors);
    let (rules, rules_log) = typed_entries::<AdmissionRuleEntry>("admission_rules", &harvest.admission_rules);
    let (texts, texts_log) = typed_entries::<AdmissionRuleText>("admission_rule_texts", &harvest.admission_rule_texts);

    let texts: Vec<AdmissionRuleText> = texts.into_iter().map(|(_, text)| text).collect();
    let mut admission_rules: Vec<AdmissionRuleEntry> = rules.into_iter().map(|(_, entry)| entry).collect();
    admission_rules.extend(extract_rule_entries(&texts));

    CheckedCatalogs {
        schools: schools.into_iter().map(|(raw, _)| raw.clone()).collect(),
        majors: majors.into_iter().map(|(raw, _)| raw.clone()).collect(),
        admission_rules,
        logs: vec![schools_log, majors_log, rules_log, texts_log],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bad_entry_is_rejected_alone() {
        let values = vec![
            json!({"name": 123}),
            json!({"name": "北京大学", "location": "北京", "website": "pku.edu.cn"}),
            json!("清华大学"),
        ];
        let (accepted, log) = typed_entries::<School>("schools", &values);

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].1.location, "北京");
        assert_eq!(log.entries_read, 3);
        assert_eq!(log.rejected.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 2]);
        assert!(log.rejected[0].reason.contains("schools entry 0"));
    }

    #[test]
    fn test_accepted_catalog_entries_stay_verbatim() {
        let harvest = PortalHarvest {
            schools: vec![json!({"name": "北京大学", "website": "pku.edu.cn"})],
            majors: vec![json!({"name": "数学", "code": 70101})],
            ..Default::default()
        };
        let checked = check_catalogs(&harvest);

        assert_eq!(checked.schools, harvest.schools);
        // a numeric code does not fit the major shape
        assert!(checked.majors.is_empty());
        assert_eq!(checked.entries_rejected(), 1);
        assert_eq!(checked.logs[1].section, "majors");
    }

    #[test]
    fn test_rule_texts_are_split_after_checking() {
        let harvest = PortalHarvest {
            admission_rules: vec![
                json!({"school_id": 7, "rules": {"body_check": "体检"}}),
                json!({"school_id": "seven"}),
            ],
            admission_rule_texts: vec![
                json!({"school_id": 1, "text": "第一条 新生入学进行体检复查"}),
                json!({"text": "没有学校编号"}),
            ],
            ..Default::default()
        };
        let checked = check_catalogs(&harvest);

        let ids: Vec<u32> = checked.admission_rules.iter().map(|entry| entry.school_id).collect();
        assert_eq!(ids, vec![7, 1]);
        assert_eq!(checked.entries_rejected(), 2);
    }
}
