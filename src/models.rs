use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub handle: String,
    pub current_rating: i32,
    pub max_rating: i32,
    pub last_sync_at: DateTime<Utc>,
    pub is_active: bool,
    pub inactivity_days: u32,
    pub reminders_sent: u32,
    pub auto_email_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a caller supplies when adding a student; the store assigns
/// the id and both timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub handle: String,
    pub current_rating: i32,
    pub max_rating: i32,
    pub last_sync_at: DateTime<Utc>,
    pub is_active: bool,
    pub inactivity_days: u32,
    pub reminders_sent: u32,
    pub auto_email_disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub handle: Option<String>,
    pub current_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub inactivity_days: Option<u32>,
    pub reminders_sent: Option<u32>,
    pub auto_email_disabled: Option<bool>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        *self == StudentPatch::default()
    }

    pub fn apply_to(self, student: &mut Student) {
        if let Some(name) = self.name {
            student.name = name;
        }
        if let Some(email) = self.email {
            student.email = email;
        }
        if let Some(phone) = self.phone {
            student.phone = phone;
        }
        if let Some(handle) = self.handle {
            student.handle = handle;
        }
        if let Some(rating) = self.current_rating {
            student.current_rating = rating;
        }
        if let Some(rating) = self.max_rating {
            student.max_rating = rating;
        }
        if let Some(at) = self.last_sync_at {
            student.last_sync_at = at;
        }
        if let Some(active) = self.is_active {
            student.is_active = active;
        }
        if let Some(days) = self.inactivity_days {
            student.inactivity_days = days;
        }
        if let Some(sent) = self.reminders_sent {
            student.reminders_sent = sent;
        }
        if let Some(disabled) = self.auto_email_disabled {
            student.auto_email_disabled = disabled;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub student_id: Uuid,
    pub contest_id: u32,
    pub contest_name: String,
    pub rank: u32,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_change: i32,
    pub time_seconds: i64,
    pub problems_solved: u32,
    pub total_problems: u32,
    pub unsolved_problems: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub date: NaiveDate,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestHistory {
    pub contests: Vec<Contest>,
    pub rating_history: Vec<RatingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemStats {
    pub total_solved: u32,
    pub avg_rating: u32,
    pub avg_per_day: f64,
    pub most_difficult_rating: u32,
    /// Keyed by band label (`800-1000` .. `1800+`).
    pub difficulty_breakdown: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemStatsWindows {
    pub last_7_days: ProblemStats,
    pub last_30_days: ProblemStats,
    pub last_90_days: ProblemStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student: Student,
    pub contest_history: ContestHistory,
    pub problem_stats: ProblemStatsWindows,
    pub submission_heatmap: Vec<HeatmapDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_students: usize,
    pub active_students: usize,
    pub inactive_students: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}
