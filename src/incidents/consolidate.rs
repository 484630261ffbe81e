//! Pincode-based consolidation of duplicate incident reports.
//!
//! Multiple residents reporting the same event from one postal area
//! collapse into a single representative report carrying the combined
//! report count, the worst severity seen, the newest timestamp and a
//! merged description.

use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::store::models::{Incident, RequestRow};

const GENERIC_SUMMARY: &str = "Multiple reports of incident in this area";

fn severity_rank(severity: Option<&str>) -> u8 {
    match severity {
        Some("high") => 3,
        Some("medium") => 2,
        _ => 1,
    }
}

pub fn consolidate_by_pincode(incidents: Vec<Incident>) -> Vec<Incident> {
    if incidents.is_empty() {
        return Vec::new();
    }

    let mut groups: HashMap<String, Vec<Incident>> = HashMap::new();
    for incident in incidents {
        let pincode = incident
            .pincode
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        groups.entry(pincode).or_default().push(incident);
    }

    let mut consolidated = Vec::new();
    for (_, group) in groups {
        if group.len() == 1 {
            let mut incident = group.into_iter().next().unwrap();
            incident.report_count = 1;
            consolidated.push(incident);
            continue;
        }

        let count = group.len() as u32;
        let descriptions: Vec<String> = group
            .iter()
            .filter_map(|i| i.description.clone())
            .filter(|d| !d.is_empty())
            .collect();
        let worst = group
            .iter()
            .max_by_key(|i| severity_rank(i.severity.as_deref()))
            .and_then(|i| i.severity.clone());
        let newest = group.iter().filter_map(|i| i.timestamp).max();

        let mut main = group.into_iter().next().unwrap();
        if !descriptions.is_empty() {
            main.description = Some(unified_description(&descriptions));
        }
        main.report_count = count;
        main.severity = worst;
        if newest.is_some() {
            main.timestamp = newest;
        }
        consolidated.push(main);
    }

    consolidated.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    consolidated
}

/// Merge several free-text descriptions into one readable summary.
pub fn unified_description(descriptions: &[String]) -> String {
    let ws = Regex::new(r"\s+").unwrap();
    let cleaned: Vec<String> = descriptions
        .iter()
        .filter(|d| !d.trim().is_empty())
        .map(|d| ws.replace_all(d.trim(), " ").to_string())
        .collect();

    if cleaned.is_empty() {
        return GENERIC_SUMMARY.to_string();
    }
    if cleaned.len() == 1 {
        return cleaned[0].clone();
    }

    // Word-frequency pass over all reports; only words longer than
    // three characters are considered meaningful.
    let word_re = Regex::new(r"\b\w+\b").unwrap();
    let mut freq: HashMap<String, usize> = HashMap::new();
    for desc in &cleaned {
        for m in word_re.find_iter(&desc.to_lowercase()) {
            let word = m.as_str();
            if word.len() > 3 {
                *freq.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut common: Vec<(String, usize)> = freq.into_iter().collect();
    common.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    common.truncate(5);

    let key_terms: Vec<String> = common
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(word, _)| word)
        .collect();

    let mut summary = if key_terms.is_empty() {
        format!("{}. ", GENERIC_SUMMARY)
    } else {
        format!(
            "Multiple reports of incident involving: {}. ",
            key_terms.join(", ")
        )
    };

    if cleaned.len() <= 3 {
        summary.push_str("Reports include: ");
        summary.push_str(&cleaned.join("; "));
    } else {
        summary.push_str(&format!(
            "Reports include: {} and {} other reports",
            cleaned[0],
            cleaned.len() - 1
        ));
    }
    summary
}

/// Collapse government requests sharing a pincode, location and severity
/// into one representative row carrying the request count.
pub fn group_requests_by_pincode(requests: Vec<RequestRow>) -> Vec<RequestRow> {
    let mut grouped: HashMap<String, RequestRow> = HashMap::new();
    for request in requests {
        let incident = request.incidents.as_ref();
        let key = format!(
            "{}:{}:{}",
            incident
                .and_then(|i| i.pincode.as_deref())
                .unwrap_or("unknown"),
            incident
                .and_then(|i| i.location.as_deref())
                .unwrap_or_default(),
            incident
                .and_then(|i| i.severity.as_deref())
                .unwrap_or_default(),
        );

        match grouped.entry(key) {
            Entry::Vacant(slot) => {
                let mut representative = request;
                representative.request_count = 1;
                slot.insert(representative);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.request_count += 1;
                if request.timestamp > existing.timestamp {
                    existing.timestamp = request.timestamp;
                }
            }
        }
    }

    let mut out: Vec<RequestRow> = grouped.into_values().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn incident(id: i64, pincode: &str, severity: &str, description: &str) -> Incident {
        Incident {
            id,
            user_id: None,
            location: Some("Riverside Colony".to_string()),
            address: None,
            city: None,
            state: None,
            cause: None,
            pincode: Some(pincode.to_string()),
            description: Some(description.to_string()),
            severity: Some(severity.to_string()),
            status: Some("pending".to_string()),
            timestamp: Some(Utc::now()),
            forwarded_at: None,
            resolved_at: None,
            report_count: 0,
        }
    }

    #[test]
    fn singleton_groups_pass_through() {
        let out = consolidate_by_pincode(vec![incident(1, "560001", "low", "tree down")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].report_count, 1);
        assert_eq!(out[0].description.as_deref(), Some("tree down"));
    }

    #[test]
    fn duplicate_pincode_reports_collapse() {
        let mut a = incident(1, "560001", "low", "flooding near the river bank");
        a.timestamp = Some(Utc::now() - Duration::hours(2));
        let b = incident(2, "560001", "high", "severe flooding on main road");
        let c = incident(3, "110001", "medium", "power lines down");

        let out = consolidate_by_pincode(vec![a, b, c]);
        assert_eq!(out.len(), 2);

        let merged = out
            .iter()
            .find(|i| i.pincode.as_deref() == Some("560001"))
            .unwrap();
        assert_eq!(merged.report_count, 2);
        assert_eq!(merged.severity.as_deref(), Some("high"));
        assert!(merged
            .description
            .as_ref()
            .unwrap()
            .contains("flooding"));
    }

    #[test]
    fn unified_description_surfaces_repeated_terms() {
        let descriptions = vec![
            "Heavy flooding near the market".to_string(),
            "flooding in the market street".to_string(),
        ];
        let merged = unified_description(&descriptions);
        assert!(merged.starts_with("Multiple reports of incident involving:"));
        assert!(merged.contains("flooding"));
        assert!(merged.contains("Reports include:"));
    }

    #[test]
    fn unified_description_falls_back_when_nothing_repeats() {
        let descriptions = vec![
            "gas leak".to_string(),
            "roof collapse".to_string(),
        ];
        let merged = unified_description(&descriptions);
        assert!(merged.starts_with(GENERIC_SUMMARY));
    }

    #[test]
    fn many_reports_are_summarised_not_listed() {
        let descriptions: Vec<String> = (0..5)
            .map(|i| format!("report number {} about flooding", i))
            .collect();
        let merged = unified_description(&descriptions);
        assert!(merged.contains("and 4 other reports"));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(consolidate_by_pincode(Vec::new()).is_empty());
        assert_eq!(unified_description(&[]), GENERIC_SUMMARY);
    }
}
