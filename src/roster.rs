use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{NewStudent, Student};

pub const ALEX_ID: Uuid = Uuid::from_u128(0x3d7f5d6f_24f7_4e8e_8b4b_3e7e44b4a7b2);
pub const SARAH_ID: Uuid = Uuid::from_u128(0x0c22f1f1_9184_4fd4_9b21_28c68a6a89dc);
pub const MIKE_ID: Uuid = Uuid::from_u128(0xd5a0a1a2_2a3c_44c2_8f73_60b7897a9dd2);
pub const EMMA_ID: Uuid = Uuid::from_u128(0x7b1e4c52_5f0d_4a8b_9c3e_1f2a6d8e4b90);

/// The demo roster every session starts from when no CSV is given.
pub fn seed_students(now: DateTime<Utc>) -> Vec<Student> {
    let students = vec![
        (
            ALEX_ID, "Alex Chen", "alex.chen@example.com", "+1234567890", "alexc_cf",
            1547, 1623, 0, true, 0, false, 30,
        ),
        (
            SARAH_ID, "Sarah Johnson", "sarah.j@example.com", "+1234567891", "sarahj_codes",
            1823, 1856, 1, true, 0, false, 45,
        ),
        (
            MIKE_ID, "Mike Rodriguez", "mike.r@example.com", "+1234567892", "mike_solver",
            1234, 1456, 8, false, 2, false, 60,
        ),
        (
            EMMA_ID, "Emma Wilson", "emma.w@example.com", "+1234567893", "emma_competitive",
            1756, 1789, 0, true, 0, true, 20,
        ),
    ];

    students
        .into_iter()
        .map(
            |(
                id,
                name,
                email,
                phone,
                handle,
                current_rating,
                max_rating,
                inactive_days,
                is_active,
                reminders_sent,
                auto_email_disabled,
                age_days,
            )| {
                let last_seen = now - Duration::days(i64::from(inactive_days));
                Student {
                    id,
                    name: name.to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                    handle: handle.to_string(),
                    current_rating,
                    max_rating,
                    last_sync_at: last_seen,
                    is_active,
                    inactivity_days: inactive_days,
                    reminders_sent,
                    auto_email_disabled,
                    created_at: now - Duration::days(age_days),
                    updated_at: last_seen,
                }
            },
        )
        .collect()
}

/// Reads roster rows from a CSV file. Activity columns are optional; a
/// missing `last_sync_at` means "just synced".
pub fn load_csv(csv_path: &Path) -> anyhow::Result<Vec<NewStudent>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        email: String,
        phone: String,
        handle: String,
        current_rating: i32,
        max_rating: i32,
        #[serde(default)]
        last_sync_at: Option<DateTime<Utc>>,
        #[serde(default)]
        is_active: Option<bool>,
        #[serde(default)]
        inactivity_days: Option<u32>,
        #[serde(default)]
        reminders_sent: Option<u32>,
        #[serde(default)]
        auto_email_disabled: Option<bool>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open roster {}", csv_path.display()))?;
    let now = Utc::now();
    let mut students = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid roster row {}", line + 1))?;
        students.push(NewStudent {
            name: row.name,
            email: row.email,
            phone: row.phone,
            handle: row.handle,
            current_rating: row.current_rating,
            max_rating: row.max_rating,
            last_sync_at: row.last_sync_at.unwrap_or(now),
            is_active: row.is_active.unwrap_or(true),
            inactivity_days: row.inactivity_days.unwrap_or(0),
            reminders_sent: row.reminders_sent.unwrap_or(0),
            auto_email_disabled: row.auto_email_disabled.unwrap_or(false),
        });
    }

    tracing::debug!("Loaded {} roster rows from {}", students.len(), csv_path.display());
    Ok(students)
}
