use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::LatencySettings;
use crate::error::SourceError;
use crate::generator;
use crate::models::{Student, StudentProfile};

pub const MIN_SYNCED_RATING: i32 = 1200;
pub const MAX_SYNCED_RATING: i32 = 1699;

/// Where the store gets profile data and refreshed ratings from.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_profile(&self, student: &Student) -> Result<StudentProfile, SourceError>;

    async fn refresh_rating(&self, student: &Student) -> Result<i32, SourceError>;
}

/// Stand-in backend: waits a fixed latency, then answers with generated data.
/// Rating refreshes fail at `sync_failure_rate`.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    profile_latency: Duration,
    sync_latency: Duration,
    sync_failure_rate: f64,
}

impl SimulatedSource {
    pub fn new(profile_latency: Duration, sync_latency: Duration) -> Self {
        Self {
            profile_latency,
            sync_latency,
            sync_failure_rate: 0.0,
        }
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.sync_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn from_settings(latency: &LatencySettings) -> Self {
        Self::new(
            Duration::from_millis(latency.profile_ms),
            Duration::from_millis(latency.sync_ms),
        )
        .with_failure_rate(latency.sync_failure_rate)
    }

    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::from_settings(&LatencySettings::default())
    }
}

fn call_time_rng() -> StdRng {
    let now = Utc::now();
    let seed = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_millis());
    StdRng::seed_from_u64(seed as u64)
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl DataSource for SimulatedSource {
    async fn fetch_profile(&self, student: &Student) -> Result<StudentProfile, SourceError> {
        simulate_latency(self.profile_latency).await;
        let mut rng = call_time_rng();
        tracing::debug!("Generating profile for {}", student.handle);
        Ok(generator::generate_profile(student, &mut rng, Utc::now()))
    }

    async fn refresh_rating(&self, student: &Student) -> Result<i32, SourceError> {
        simulate_latency(self.sync_latency).await;
        let mut rng = call_time_rng();
        if rng.gen_bool(self.sync_failure_rate) {
            tracing::warn!("Contest platform unavailable for {}", student.handle);
            return Err(SourceError::Unavailable(
                "contest platform did not respond".to_string(),
            ));
        }
        let rating = rng.gen_range(MIN_SYNCED_RATING..=MAX_SYNCED_RATING);
        tracing::debug!("Refreshed rating for {}: {}", student.handle, rating);
        Ok(rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::seed_students;

    #[tokio::test]
    async fn refreshed_ratings_stay_in_range() {
        let source = SimulatedSource::instant();
        let student = seed_students(Utc::now()).remove(1);

        for _ in 0..50 {
            let rating = source.refresh_rating(&student).await.unwrap();
            assert!((MIN_SYNCED_RATING..=MAX_SYNCED_RATING).contains(&rating));
        }
    }

    #[tokio::test]
    async fn fetched_profile_belongs_to_student() {
        let source = SimulatedSource::instant();
        let student = seed_students(Utc::now()).remove(2);

        let profile = source.fetch_profile(&student).await.unwrap();
        assert_eq!(profile.student.id, student.id);
        assert_eq!(profile.submission_heatmap.len(), 365);
    }

    #[tokio::test]
    async fn certain_failure_rate_reports_unavailable() {
        let source = SimulatedSource::instant().with_failure_rate(1.0);
        let student = seed_students(Utc::now()).remove(0);

        let err = source.refresh_rating(&student).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
        // Profiles are unaffected.
        assert!(source.fetch_profile(&student).await.is_ok());
    }

    #[test]
    fn failure_rate_is_clamped() {
        assert_eq!(SimulatedSource::instant().with_failure_rate(3.0).sync_failure_rate, 1.0);
        assert_eq!(SimulatedSource::instant().with_failure_rate(-1.0).sync_failure_rate, 0.0);
    }

    #[test]
    fn default_latency_matches_settings() {
        let source = SimulatedSource::default();
        assert_eq!(source.profile_latency, Duration::from_millis(500));
        assert_eq!(source.sync_latency, Duration::from_millis(2000));
        assert_eq!(source.sync_failure_rate, 0.0);
    }
}
