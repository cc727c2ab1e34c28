use crate::config::ReminderSettings;
use crate::models::Student;

/// Students an inactivity reminder would go out to, in roster order.
pub fn reminder_candidates<'a>(
    students: &'a [Student],
    settings: &ReminderSettings,
) -> Vec<&'a Student> {
    students
        .iter()
        .filter(|s| s.inactivity_days > settings.inactivity_threshold_days)
        .filter(|s| !s.auto_email_disabled)
        .filter(|s| s.reminders_sent < settings.max_reminders)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::roster::{seed_students, EMMA_ID, MIKE_ID};

    #[test]
    fn picks_inactive_students_under_the_cap() {
        let students = seed_students(Utc::now());
        let candidates = reminder_candidates(&students, &ReminderSettings::default());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, MIKE_ID);
    }

    #[test]
    fn skips_capped_and_opted_out() {
        let mut students = seed_students(Utc::now());
        for student in students.iter_mut() {
            student.inactivity_days = 10;
        }
        let mike = students.iter_mut().find(|s| s.id == MIKE_ID).unwrap();
        mike.reminders_sent = 3;

        let candidates = reminder_candidates(&students, &ReminderSettings::default());
        let ids: Vec<_> = candidates.iter().map(|s| s.id).collect();

        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&MIKE_ID));
        assert!(!ids.contains(&EMMA_ID));
    }
}
