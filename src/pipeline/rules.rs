use tracing::info;

use crate::constants::RULE_CONTEXT_LINES;
use crate::domain::{AdmissionRuleEntry, AdmissionRuleText, AdmissionRules};

/// Lines mentioning any keyword, with `context_lines` of context on each side.
///
/// Overlapping windows are merged so every line appears once, in document
/// order. Returns an empty string when no line matches.
pub fn extract_section(text: &str, keywords: &[&str], context_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut keep = vec![false; lines.len()];

    for (i, line) in lines.iter().enumerate() {
        if keywords.iter().any(|keyword| line.contains(keyword)) {
            let start = i.saturating_sub(context_lines);
            let end = (i + context_lines + 1).min(lines.len());
            keep[start..end].iter_mut().for_each(|k| *k = true);
        }
    }

    lines
        .iter()
        .zip(keep)
        .filter_map(|(line, kept)| kept.then_some(*line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn mentions_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}

/// Split admission-rule document text into its known sections
pub fn extract_rules(text: &str) -> AdmissionRules {
    let section = |keywords: &[&str]| extract_section(text, keywords, RULE_CONTEXT_LINES);
    let mut rules = AdmissionRules::default();

    if mentions_any(text, &["体检", "身体"]) {
        rules.body_check = section(&["体检", "身体", "健康"]);
    }
    if mentions_any(text, &["单科", "科目"]) {
        rules.subject_scores = section(&["单科", "科目", "数学", "英语"]);
    }
    if mentions_any(text, &["加分", "政策"]) {
        rules.bonus_policies = section(&["加分", "政策", "优惠"]);
    }
    rules.admission_rules = section(&["录取", "招生", "投档"]);
    rules.special_requirements = section(&["特殊", "要求", "限制"]);

    info!("Rule text split, {} sections found", rules.sections_found());
    rules
}

/// Extract every raw rule document, dropping those where nothing was found
pub fn extract_rule_entries(texts: &[AdmissionRuleText]) -> Vec<AdmissionRuleEntry> {
    texts
        .iter()
        .filter_map(|doc| {
            let rules = extract_rules(&doc.text);
            if rules.is_empty() {
                info!("No rule sections found for school {}", doc.school_id);
                None
            } else {
                Some(AdmissionRuleEntry {
                    school_id: doc.school_id,
                    rules,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHARTER: &str = "第一章 总则\n\
        第二条 本校招生工作遵循公平原则\n\
        第三条 学校地址\n\
        第四条 办学层次\n\
        第五条 校区\n\
        第六条 学费\n\
        第七条 住宿\n\
        第八条 新生入学后进行体检复查\n\
        第九条 奖学金\n\
        第十条 附则";

    #[test]
    fn test_extract_section_windows() {
        let section = extract_section(CHARTER, &["体检"], 1);
        assert_eq!(section, "第七条 住宿\n第八条 新生入学后进行体检复查\n第九条 奖学金");
        assert_eq!(extract_section(CHARTER, &["不存在"], 3), "");
    }

    #[test]
    fn test_overlapping_windows_are_merged() {
        let text = "a\nkey one\nb\nkey two\nc";
        assert_eq!(extract_section(text, &["key"], 1), "a\nkey one\nb\nkey two\nc");
        assert_eq!(extract_section(text, &["key"], 0), "key one\nkey two");
    }

    #[test]
    fn test_extract_rules_respects_section_triggers() {
        let rules = extract_rules(CHARTER);
        assert!(rules.body_check.contains("体检复查"));
        assert!(rules.admission_rules.contains("招生工作"));
        assert_eq!(rules.subject_scores, "");
        assert_eq!(rules.bonus_policies, "");
        assert_eq!(rules.special_requirements, "");
        assert_eq!(rules.sections_found(), 2);
    }

    #[test]
    fn test_health_alone_does_not_trigger_body_check() {
        // 健康 is a keyword for the window but not a trigger for the section
        let rules = extract_rules("学生应身心健康");
        assert_eq!(rules.body_check, "");
    }

    #[test]
    fn test_extract_rule_entries_drops_empty_documents() {
        let texts = vec![
            AdmissionRuleText { school_id: 1, text: CHARTER.to_string() },
            AdmissionRuleText { school_id: 2, text: "无相关内容".to_string() },
        ];
        let entries = extract_rule_entries(&texts);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].school_id, 1);
    }
}
