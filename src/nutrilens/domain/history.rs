use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One food scan, as stored by the backend and kept in the local food log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub name: String,
    pub final_rating: f64,
    pub calories: f64,
}

impl HistoryEntry {
    /// Entries with missing or mistyped fields are dropped, not reported.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Identifier understood by the backend's delete endpoint.
pub fn entry_id(date: &str, name: &str) -> String {
    format!("{} {}", date, name)
}

/// Today's date in the server's local time zone, as entries are stamped.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub final_rating: f64,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyHistory {
    pub date: String,
    pub total_calories: f64,
    pub entries: Vec<HistoryEntry>,
}

// 日付 (YYYY-MM-DD) ごとにまとめ、新しい日付を先頭にする
pub fn group_by_date(entries: &[HistoryEntry]) -> Vec<DailyHistory> {
    let mut days: BTreeMap<&str, Vec<HistoryEntry>> = BTreeMap::new();
    for entry in entries {
        days.entry(entry.date.as_str()).or_default().push(entry.clone());
    }
    days.into_iter()
        .rev()
        .map(|(date, entries)| DailyHistory {
            date: date.to_string(),
            total_calories: entries.iter().map(|e| e.calories).sum(),
            entries,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(date: &str, name: &str, calories: f64) -> HistoryEntry {
        HistoryEntry {
            date: date.to_string(),
            name: name.to_string(),
            final_rating: 5.0,
            calories,
        }
    }

    #[test]
    fn test_group_by_date_sorts_newest_first_and_sums() {
        let entries = vec![
            entry("2024-03-01", "oats", 150.0),
            entry("2024-03-02", "chips", 500.0),
            entry("2024-03-01", "milk", 120.0),
        ];
        let days = group_by_date(&entries);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2024-03-02");
        assert_eq!(days[0].total_calories, 500.0);
        assert_eq!(days[1].total_calories, 270.0);
        assert_eq!(days[1].entries[0].name, "oats");
        assert_eq!(days[1].entries[1].name, "milk");
    }

    #[test]
    fn test_from_value_drops_mistyped_entries() {
        assert!(HistoryEntry::from_value(&json!({
            "date": "2024-03-01", "name": "oats", "final_rating": 7, "calories": 150
        }))
        .is_some());
        assert!(HistoryEntry::from_value(&json!({
            "date": "2024-03-01", "name": "oats", "final_rating": null, "calories": 150
        }))
        .is_none());
        assert!(HistoryEntry::from_value(&json!({"name": "oats"})).is_none());
    }

    #[test]
    fn test_new_entry_uses_backend_field_names() {
        let body = serde_json::to_value(NewHistoryEntry {
            user_id: "user_1".to_string(),
            name: "oats".to_string(),
            final_rating: 7.0,
            calories: 150.0,
        })
        .unwrap();
        assert_eq!(body["userId"], "user_1");
        assert_eq!(body["final_rating"], 7.0);
    }

    #[test]
    fn test_entry_id() {
        assert_eq!(entry_id("2024-03-01", "peanut butter"), "2024-03-01 peanut butter");
    }

    #[test]
    fn test_today_follows_local_clock() {
        let today = today();
        assert_eq!(today, Local::now().date_naive().format("%Y-%m-%d").to_string());
        assert!(chrono::NaiveDate::parse_from_str(&today, "%Y-%m-%d").is_ok());
    }
}
