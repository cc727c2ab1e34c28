use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{Result, SourceError, StoreError};
use crate::models::{NewStudent, Student, StudentPatch, StudentProfile, SyncStatus};
use crate::roster;
use crate::source::DataSource;
use crate::validation;

/// Per-student result of a bulk sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { rating: i32 },
    NotFound,
    Failed(String),
}

/// Holds `Syncing` while a refresh is in flight and puts the previous status
/// back when dropped, so an abandoned sync future cannot leave it stuck.
struct SyncingGuard<'a> {
    status: &'a mut SyncStatus,
    previous: SyncStatus,
}

impl<'a> SyncingGuard<'a> {
    fn enter(status: &'a mut SyncStatus) -> Self {
        let previous = *status;
        *status = SyncStatus::Syncing;
        Self { status, previous }
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        *self.status = self.previous;
    }
}

/// Owns every student record for the session. Reads hand out copies; only
/// the store's own methods mutate the collection.
pub struct StudentStore<S> {
    students: Vec<Student>,
    source: S,
    status: SyncStatus,
    last_error: Option<String>,
}

impl<S: DataSource> StudentStore<S> {
    pub fn new(source: S) -> Self {
        Self {
            students: Vec::new(),
            source,
            status: SyncStatus::Idle,
            last_error: None,
        }
    }

    /// A store preloaded with the demo roster.
    pub fn seeded(source: S, now: DateTime<Utc>) -> Self {
        let mut store = Self::new(source);
        store.students = roster::seed_students(now);
        store
    }

    pub fn list(&self) -> Vec<Student> {
        self.students.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Student> {
        self.students.iter().find(|s| s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Message from the most recent failed sync, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn add(&mut self, data: NewStudent) -> Result<Student> {
        validation::validate_new(&data).map_err(StoreError::Invalid)?;

        let now = Utc::now();
        let student = Student {
            id: self.fresh_id(),
            name: data.name,
            email: data.email,
            phone: data.phone,
            handle: data.handle,
            current_rating: data.current_rating,
            max_rating: data.max_rating,
            last_sync_at: data.last_sync_at,
            is_active: data.is_active,
            inactivity_days: data.inactivity_days,
            reminders_sent: data.reminders_sent,
            auto_email_disabled: data.auto_email_disabled,
            created_at: now,
            updated_at: now,
        };

        tracing::info!("Student added: {} ({})", student.id, student.handle);
        self.students.push(student.clone());
        Ok(student)
    }

    pub fn update(&mut self, id: Uuid, patch: StudentPatch) -> Result<Student> {
        let slot = self.find_mut(id).ok_or(StoreError::NotFound(id))?;

        let mut merged = slot.clone();
        patch.apply_to(&mut merged);
        validation::validate_student(&merged).map_err(StoreError::Invalid)?;
        merged.updated_at = advance(slot.updated_at);

        *slot = merged.clone();
        tracing::info!("Student updated: {}", id);
        Ok(merged)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Student> {
        let index = self.students.iter().position(|s| s.id == id)?;
        let removed = self.students.remove(index);
        tracing::info!("Student removed: {}", id);
        Some(removed)
    }

    pub fn record_reminder(&mut self, id: Uuid) -> Result<Student> {
        let slot = self.find_mut(id).ok_or(StoreError::NotFound(id))?;
        slot.reminders_sent = slot.reminders_sent.saturating_add(1);
        slot.updated_at = advance(slot.updated_at);
        tracing::debug!("Reminder recorded for {} ({} sent)", id, slot.reminders_sent);
        Ok(slot.clone())
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<StudentProfile> {
        let student = self.get(id).ok_or(StoreError::NotFound(id))?;
        let profile = self.source.fetch_profile(&student).await?;
        Ok(profile)
    }

    /// Pulls a fresh rating for one student. On failure the record is left
    /// untouched and the message lands in `last_error`.
    pub async fn sync(&mut self, id: Uuid) -> Result<Student> {
        let snapshot = self.get(id).ok_or(StoreError::NotFound(id))?;

        tracing::info!("Syncing student {} ({})", id, snapshot.handle);
        let refreshed = {
            let _syncing = SyncingGuard::enter(&mut self.status);
            self.source.refresh_rating(&snapshot).await
        };

        let refreshed = refreshed.and_then(|rating| {
            if rating < 0 {
                Err(SourceError::Malformed(format!("negative rating {rating}")))
            } else {
                Ok(rating)
            }
        });

        match refreshed {
            Ok(rating) => {
                let Some(slot) = self.find_mut(id) else {
                    self.status = SyncStatus::Idle;
                    return Err(StoreError::NotFound(id));
                };

                let now = Utc::now();
                slot.last_sync_at = slot.last_sync_at.max(now);
                slot.current_rating = rating;
                slot.max_rating = slot.max_rating.max(rating);
                slot.updated_at = advance(slot.updated_at);
                let updated = slot.clone();

                self.status = SyncStatus::Idle;
                self.last_error = None;
                tracing::info!("Student {} synced at rating {}", id, rating);
                Ok(updated)
            }
            Err(err) => {
                let message = format!("Failed to sync student data: {err}");
                tracing::warn!("{}", message);
                self.status = SyncStatus::Error;
                self.last_error = Some(message.clone());
                Err(StoreError::SyncFailed { id, message })
            }
        }
    }

    /// Syncs every student in roster order.
    pub async fn sync_all(&mut self) -> Vec<(Uuid, SyncOutcome)> {
        let ids: Vec<Uuid> = self.students.iter().map(|s| s.id).collect();
        let mut outcomes = Vec::with_capacity(ids.len());

        for id in ids {
            let outcome = match self.sync(id).await {
                Ok(student) => SyncOutcome::Synced {
                    rating: student.current_rating,
                },
                Err(StoreError::NotFound(_)) => SyncOutcome::NotFound,
                Err(err) => SyncOutcome::Failed(err.to_string()),
            };
            outcomes.push((id, outcome));
        }

        let failed = outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SyncOutcome::Failed(_)))
            .count();
        tracing::info!(
            "Bulk sync finished: {} students, {} failed",
            outcomes.len(),
            failed
        );
        outcomes
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut Student> {
        self.students.iter_mut().find(|s| s.id == id)
    }

    fn fresh_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if self.students.iter().all(|s| s.id != id) {
                return id;
            }
        }
    }
}

/// Now, or one microsecond past `previous` if the clock has not moved on.
fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;

    use super::*;
    use crate::roster::ALEX_ID;
    use crate::source::{SimulatedSource, MAX_SYNCED_RATING, MIN_SYNCED_RATING};

    struct FailingSource;

    #[async_trait]
    impl DataSource for FailingSource {
        async fn fetch_profile(
            &self,
            _student: &Student,
        ) -> std::result::Result<StudentProfile, SourceError> {
            Err(SourceError::Unavailable("contest platform timed out".into()))
        }

        async fn refresh_rating(
            &self,
            _student: &Student,
        ) -> std::result::Result<i32, SourceError> {
            Err(SourceError::Unavailable("contest platform timed out".into()))
        }
    }

    fn store() -> StudentStore<SimulatedSource> {
        StudentStore::seeded(SimulatedSource::instant(), Utc::now())
    }

    fn alex_id() -> Uuid {
        ALEX_ID
    }

    fn newcomer() -> NewStudent {
        NewStudent {
            name: "Priya Nair".to_string(),
            email: "priya@example.com".to_string(),
            phone: "+1234567899".to_string(),
            handle: "priya_n".to_string(),
            current_rating: 1400,
            max_rating: 1500,
            last_sync_at: Utc::now(),
            is_active: true,
            inactivity_days: 0,
            reminders_sent: 0,
            auto_email_disabled: false,
        }
    }

    #[test]
    fn add_appends_with_fresh_id() {
        let mut store = store();
        let before = store.list();

        let created = store.add(newcomer()).unwrap();
        let after = store.list();

        assert_eq!(after.len(), before.len() + 1);
        assert!(before.iter().all(|s| s.id != created.id));
        assert_eq!(after.last().unwrap(), &created);
        assert_eq!(created.created_at, created.updated_at);
    }

    #[test]
    fn add_rejects_invalid_input() {
        let mut store = store();
        let mut data = newcomer();
        data.max_rating = 1000;

        let err = store.add(data).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref errors) if errors.has("max_rating")));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn update_changes_only_patched_fields() {
        let mut store = store();
        let before = store.get(alex_id()).unwrap();

        let patch = StudentPatch {
            name: Some("X".to_string()),
            ..StudentPatch::default()
        };
        let after = store.update(alex_id(), patch).unwrap();

        assert_eq!(after.name, "X");
        assert!(after.updated_at > before.updated_at);
        let mut expected = before.clone();
        expected.name = "X".to_string();
        expected.updated_at = after.updated_at;
        assert_eq!(after, expected);
    }

    #[test]
    fn update_rating_shows_in_list() {
        let mut store = store();
        let before = store.get(alex_id()).unwrap();
        assert_eq!(before.current_rating, 1547);

        let patch = StudentPatch {
            current_rating: Some(1600),
            ..StudentPatch::default()
        };
        store.update(alex_id(), patch).unwrap();

        let listed = store
            .list()
            .into_iter()
            .find(|s| s.id == alex_id())
            .unwrap();
        assert_eq!(listed.current_rating, 1600);
        assert!(listed.updated_at > before.updated_at);
        assert_eq!(listed.name, before.name);
        assert_eq!(listed.max_rating, before.max_rating);
        assert_eq!(listed.created_at, before.created_at);
    }

    #[test]
    fn update_missing_student_is_not_found() {
        let mut store = store();
        let err = store
            .update(Uuid::new_v4(), StudentPatch::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn update_keeps_record_when_validation_fails() {
        let mut store = store();
        let before = store.get(alex_id()).unwrap();

        let patch = StudentPatch {
            current_rating: Some(1700),
            ..StudentPatch::default()
        };
        let err = store.update(alex_id(), patch).unwrap_err();

        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.get(alex_id()).unwrap(), before);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = store();

        assert!(store.remove(alex_id()).is_some());
        let snapshot = store.list();
        assert!(store.remove(alex_id()).is_none());
        assert_eq!(store.list(), snapshot);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn record_reminder_counts_up() {
        let mut store = store();
        let student = store.record_reminder(alex_id()).unwrap();
        assert_eq!(student.reminders_sent, 1);
        assert!(store.record_reminder(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn record_reminder_saturates() {
        let mut store = store();
        let patch = StudentPatch {
            reminders_sent: Some(u32::MAX),
            ..StudentPatch::default()
        };
        store.update(alex_id(), patch).unwrap();

        let student = store.record_reminder(alex_id()).unwrap();
        assert_eq!(student.reminders_sent, u32::MAX);
    }

    #[tokio::test]
    async fn profile_for_missing_student_is_not_found() {
        let store = store();
        let err = store.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn profile_contest_chain_is_consistent() {
        let store = store();
        let profile = store.get_profile(alex_id()).await.unwrap();

        let contests = &profile.contest_history.contests;
        assert!(!contests.is_empty());
        for pair in contests.windows(2) {
            assert_eq!(pair[0].new_rating, pair[1].old_rating);
        }
    }

    #[tokio::test]
    async fn sync_sets_rating_in_range() {
        let mut store = store();
        let before = store.get(alex_id()).unwrap();

        let after = store.sync(alex_id()).await.unwrap();

        assert!((MIN_SYNCED_RATING..=MAX_SYNCED_RATING).contains(&after.current_rating));
        assert!(after.last_sync_at >= before.last_sync_at);
        assert!(after.max_rating >= after.current_rating);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(store.status(), SyncStatus::Idle);
        assert!(store.last_error().is_none());
    }

    #[tokio::test]
    async fn sync_missing_student_is_not_found() {
        let mut store = store();
        let err = store.sync(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn failed_sync_leaves_record_and_reports() {
        let mut store = StudentStore::seeded(FailingSource, Utc::now());
        let before = store.get(alex_id()).unwrap();

        let err = store.sync(alex_id()).await.unwrap_err();

        assert!(matches!(err, StoreError::SyncFailed { id, .. } if id == alex_id()));
        assert_eq!(store.get(alex_id()).unwrap(), before);
        assert_eq!(store.status(), SyncStatus::Error);
        assert!(store.last_error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn abandoned_sync_restores_status() {
        let source = SimulatedSource::new(StdDuration::ZERO, StdDuration::from_millis(500));
        let mut store = StudentStore::seeded(source, Utc::now());
        let before = store.get(alex_id()).unwrap();

        let timed_out = tokio::time::timeout(StdDuration::from_millis(10), store.sync(alex_id()))
            .await
            .is_err();

        assert!(timed_out);
        assert_eq!(store.status(), SyncStatus::Idle);
        assert!(store.last_error().is_none());
        assert_eq!(store.get(alex_id()).unwrap(), before);
    }

    #[tokio::test]
    async fn flaky_source_failure_is_reported() {
        let source = SimulatedSource::instant().with_failure_rate(1.0);
        let mut store = StudentStore::seeded(source, Utc::now());
        let before = store.get(alex_id()).unwrap();

        let err = store.sync(alex_id()).await.unwrap_err();

        assert!(matches!(err, StoreError::SyncFailed { .. }));
        assert_eq!(store.get(alex_id()).unwrap(), before);
        assert_eq!(store.status(), SyncStatus::Error);
        assert!(store.last_error().unwrap().contains("did not respond"));
    }

    #[tokio::test]
    async fn failed_profile_is_a_source_error() {
        let store = StudentStore::seeded(FailingSource, Utc::now());
        let err = store.get_profile(alex_id()).await.unwrap_err();
        assert!(matches!(err, StoreError::Source(SourceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn sync_all_reports_each_student() {
        let mut store = store();
        let outcomes = store.sync_all().await;

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes
            .iter()
            .all(|(_, outcome)| matches!(outcome, SyncOutcome::Synced { .. })));
        let ids: Vec<Uuid> = store.list().iter().map(|s| s.id).collect();
        let synced: Vec<Uuid> = outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, synced);
    }
}
