use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;

use crate::models::Student;

#[derive(Debug, Clone, PartialEq)]
pub struct RosterSummary {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub avg_rating: i32,
    pub needing_attention: usize,
    pub recent_syncs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTier {
    Newbie,
    Pupil,
    Specialist,
    Expert,
    Master,
}

impl RatingTier {
    pub const ALL: [RatingTier; 5] = [
        RatingTier::Newbie,
        RatingTier::Pupil,
        RatingTier::Specialist,
        RatingTier::Expert,
        RatingTier::Master,
    ];

    pub fn for_rating(rating: i32) -> Self {
        match rating {
            i32::MIN..=1199 => RatingTier::Newbie,
            1200..=1399 => RatingTier::Pupil,
            1400..=1599 => RatingTier::Specialist,
            1600..=1899 => RatingTier::Expert,
            _ => RatingTier::Master,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RatingTier::Newbie => "Newbie (0-1199)",
            RatingTier::Pupil => "Pupil (1200-1399)",
            RatingTier::Specialist => "Specialist (1400-1599)",
            RatingTier::Expert => "Expert (1600-1899)",
            RatingTier::Master => "Master (1900+)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    Name,
    Handle,
    CurrentRating,
    MaxRating,
    LastSync,
    InactivityDays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

pub fn summarize(
    students: &[Student],
    now: DateTime<Utc>,
    attention_threshold_days: u32,
) -> RosterSummary {
    let active = students.iter().filter(|s| s.is_active).count();
    let avg_rating = if students.is_empty() {
        0
    } else {
        let total: i64 = students.iter().map(|s| i64::from(s.current_rating)).sum();
        (total as f64 / students.len() as f64).round() as i32
    };
    let day_ago = now - Duration::hours(24);

    RosterSummary {
        total: students.len(),
        active,
        inactive: students.len() - active,
        avg_rating,
        needing_attention: students
            .iter()
            .filter(|s| s.inactivity_days > attention_threshold_days)
            .count(),
        recent_syncs: students
            .iter()
            .filter(|s| s.last_sync_at > day_ago && s.last_sync_at <= now)
            .count(),
    }
}

pub fn tier_distribution(students: &[Student]) -> Vec<(RatingTier, usize)> {
    RatingTier::ALL
        .iter()
        .map(|&tier| {
            let count = students
                .iter()
                .filter(|s| RatingTier::for_rating(s.current_rating) == tier)
                .count();
            (tier, count)
        })
        .collect()
}

pub fn sort_students(students: &mut [Student], field: SortField, direction: SortDirection) {
    students.sort_by(|a, b| {
        let ordering = compare(a, b, field);
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn compare(a: &Student, b: &Student, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortField::Handle => a.handle.to_lowercase().cmp(&b.handle.to_lowercase()),
        SortField::CurrentRating => a.current_rating.cmp(&b.current_rating),
        SortField::MaxRating => a.max_rating.cmp(&b.max_rating),
        SortField::LastSync => a.last_sync_at.cmp(&b.last_sync_at),
        SortField::InactivityDays => a.inactivity_days.cmp(&b.inactivity_days),
    }
}
