use crate::domain::history::{group_by_date, DailyHistory, HistoryEntry};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Entries kept per user; older ones are evicted first.
pub const MAX_ENTRIES_PER_USER: usize = 200;

/// Food entries recorded by scans in this process, kept apart per user.
///
/// Cloning yields another handle to the same log; services that need it get
/// a handle injected instead of reaching for shared global state.
#[derive(Clone)]
pub struct FoodLog {
    users: Arc<Mutex<HashMap<String, VecDeque<HistoryEntry>>>>,
    capacity: usize,
}

impl Default for FoodLog {
    fn default() -> Self {
        Self::with_capacity(MAX_ENTRIES_PER_USER)
    }
}

impl FoodLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<HistoryEntry>>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, user_id: &str, entry: HistoryEntry) {
        let mut users = self.lock();
        let entries = users.entry(user_id.to_string()).or_default();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn entries(&self, user_id: &str) -> Vec<HistoryEntry> {
        self.lock()
            .get(user_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, user_id: &str) -> usize {
        self.lock().get(user_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }

    pub fn total_calories_on(&self, user_id: &str, date: &str) -> f64 {
        self.lock()
            .get(user_id)
            .map(|entries| entries.iter().filter(|e| e.date == date).map(|e| e.calories).sum())
            .unwrap_or(0.0)
    }

    pub fn daily(&self, user_id: &str) -> Vec<DailyHistory> {
        group_by_date(&self.entries(user_id))
    }
}
