use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analytics;
use crate::config::Settings;
use crate::models::Student;
use crate::reminders;
use crate::schedule::{self, ScheduleError};

pub fn build_report(
    students: &[Student],
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<String, ScheduleError> {
    let threshold = settings.reminders.inactivity_threshold_days;
    let summary = analytics::summarize(students, now, threshold);
    let distribution = analytics::tier_distribution(students);
    let next_sync = schedule::next_sync_at(&settings.sync, now)?;

    let mut output = String::new();

    let _ = writeln!(output, "# Student Progress Report");
    let _ = writeln!(output, "Generated {}", now.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster Summary");
    let _ = writeln!(
        output,
        "- {} students ({} active, {} inactive)",
        summary.total, summary.active, summary.inactive
    );
    let _ = writeln!(output, "- Average rating {}", summary.avg_rating);
    let _ = writeln!(output, "- {} synced in the last 24 hours", summary.recent_syncs);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rating Distribution");
    for (tier, count) in distribution.iter() {
        let _ = writeln!(output, "- {}: {}", tier.label(), count);
    }

    let mut attention: Vec<&Student> = students
        .iter()
        .filter(|s| s.inactivity_days > threshold)
        .collect();
    attention.sort_by(|a, b| b.inactivity_days.cmp(&a.inactivity_days));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");

    if attention.is_empty() {
        let _ = writeln!(output, "No students inactive for more than {threshold} days.");
    } else {
        for student in attention.iter() {
            let _ = writeln!(
                output,
                "- {} ({}) inactive {} days, last sync {}",
                student.name,
                student.handle,
                student.inactivity_days,
                student.last_sync_at.format("%Y-%m-%d")
            );
        }
    }

    let candidates = reminders::reminder_candidates(students, &settings.reminders);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Reminders Due");

    if candidates.is_empty() {
        let _ = writeln!(output, "No reminders due.");
    } else {
        for student in candidates.iter() {
            let _ = writeln!(
                output,
                "- {} <{}> ({} of {} sent)",
                student.name,
                student.email,
                student.reminders_sent,
                settings.reminders.max_reminders
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sync Schedule");
    if settings.sync.auto_sync {
        let _ = writeln!(output, "Automatic sync {}.", settings.sync.describe());
    } else {
        let _ = writeln!(output, "Automatic sync is off.");
    }
    if let Some(next) = next_sync {
        let _ = writeln!(output, "Next sync {}.", next.format("%Y-%m-%d %H:%M UTC"));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::seed_students;

    #[test]
    fn report_covers_every_section() {
        let now = Utc::now();
        let report = build_report(&seed_students(now), &Settings::default(), now).unwrap();

        assert!(report.starts_with("# Student Progress Report"));
        assert!(report.contains("- 4 students (3 active, 1 inactive)"));
        assert!(report.contains("- Average rating 1590"));
        assert!(report.contains("- Expert (1600-1899): 2"));
        assert!(report.contains("- Mike Rodriguez (mike_solver) inactive 8 days"));
        assert!(report.contains("- Mike Rodriguez <mike.r@example.com> (2 of 3 sent)"));
        assert!(report.contains("Automatic sync daily at 02:00 UTC."));
        assert!(report.contains("Next sync "));
    }

    #[test]
    fn empty_roster_report() {
        let mut settings = Settings::default();
        settings.sync.auto_sync = false;
        let report = build_report(&[], &settings, Utc::now()).unwrap();

        assert!(report.contains("No students inactive for more than 7 days."));
        assert!(report.contains("No reminders due."));
        assert!(report.contains("Automatic sync is off."));
        assert!(!report.contains("Next sync "));
    }
}
