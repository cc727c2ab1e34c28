//! Synthetic profile data for a student.
//!
//! Everything here is plausible filler for the views: a random-walk contest
//! history, windowed solve statistics and a year of submission counts. The
//! only guarantees are shape ones (chain consistency, band totals, day
//! coverage).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;

use crate::models::{
    Contest, ContestHistory, HeatmapDay, ProblemStats, ProblemStatsWindows, RatingPoint, Student,
    StudentProfile,
};

pub const CONTEST_COUNT: u32 = 15;
pub const STARTING_RATING: i32 = 1200;
pub const RATING_FLOOR: i32 = 800;
pub const FIRST_CONTEST_ID: u32 = 1700;
pub const HEATMAP_DAYS: i64 = 365;

const PROBLEMS_PER_CONTEST: u32 = 8;

pub const DIFFICULTY_BANDS: [(&str, u32, Option<u32>); 6] = [
    ("800-1000", 800, Some(1000)),
    ("1000-1200", 1000, Some(1200)),
    ("1200-1400", 1200, Some(1400)),
    ("1400-1600", 1400, Some(1600)),
    ("1600-1800", 1600, Some(1800)),
    ("1800+", 1800, None),
];

pub fn generate_profile<R: Rng + ?Sized>(
    student: &Student,
    rng: &mut R,
    now: DateTime<Utc>,
) -> StudentProfile {
    let contests = contest_history(student, rng, now);
    let rating_history = contests
        .iter()
        .filter_map(|contest| {
            DateTime::from_timestamp(contest.time_seconds, 0).map(|at| RatingPoint {
                date: at.date_naive(),
                rating: contest.new_rating,
            })
        })
        .collect();

    StudentProfile {
        student: student.clone(),
        contest_history: ContestHistory {
            contests,
            rating_history,
        },
        problem_stats: ProblemStatsWindows {
            last_7_days: problem_stats(rng, 7),
            last_30_days: problem_stats(rng, 30),
            last_90_days: problem_stats(rng, 90),
        },
        submission_heatmap: submission_heatmap(rng, now.date_naive()),
    }
}

/// Oldest contest first, one week apart, with the last one at `now`.
pub fn contest_history<R: Rng + ?Sized>(
    student: &Student,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Vec<Contest> {
    let mut contests = Vec::with_capacity(CONTEST_COUNT as usize);
    let mut rating = STARTING_RATING;

    for i in 0..CONTEST_COUNT {
        let weeks_before_now = i64::from(CONTEST_COUNT - 1 - i);
        let held_at = now - Duration::weeks(weeks_before_now);
        let new_rating = (rating + rng.gen_range(-100..100)).max(RATING_FLOOR);
        let contest_id = FIRST_CONTEST_ID + i;
        let problems_solved = rng.gen_range(1..=6);

        contests.push(Contest {
            id: format!("contest-{i}"),
            student_id: student.id,
            contest_id,
            contest_name: format!("Codeforces Round #{contest_id}"),
            rank: rng.gen_range(100..5100),
            old_rating: rating,
            new_rating,
            rating_change: new_rating - rating,
            time_seconds: held_at.timestamp(),
            problems_solved,
            total_problems: PROBLEMS_PER_CONTEST,
            unsolved_problems: rng.gen_range(0..3),
        });

        rating = new_rating;
    }

    contests
}

pub fn problem_stats<R: Rng + ?Sized>(rng: &mut R, days: u32) -> ProblemStats {
    let days = days.max(1);
    let total_solved = rng.gen_range(days..days * 3);
    let ratings: Vec<u32> = (0..total_solved)
        .map(|_| rng.gen_range(800..2300))
        .collect();

    let mut difficulty_breakdown = BTreeMap::new();
    for (label, low, high) in DIFFICULTY_BANDS {
        let count = ratings
            .iter()
            .filter(|&&r| r >= low && high.map_or(true, |high| r < high))
            .count();
        difficulty_breakdown.insert(label.to_string(), count as u32);
    }

    let avg_rating = if ratings.is_empty() {
        0
    } else {
        (ratings.iter().map(|&r| u64::from(r)).sum::<u64>() / ratings.len() as u64) as u32
    };
    let avg_per_day = (f64::from(total_solved) / f64::from(days) * 10.0).round() / 10.0;

    ProblemStats {
        total_solved,
        avg_rating,
        avg_per_day,
        most_difficult_rating: ratings.iter().copied().max().unwrap_or(0),
        difficulty_breakdown,
    }
}

/// One entry per day for the year ending on `today`, oldest first.
pub fn submission_heatmap<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> Vec<HeatmapDay> {
    (0..HEATMAP_DAYS)
        .rev()
        .map(|days_ago| {
            let count = if rng.gen_bool(0.7) {
                rng.gen_range(0..10)
            } else {
                0
            };
            HeatmapDay {
                date: today - Duration::days(days_ago),
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::roster::seed_students;

    fn alex() -> Student {
        seed_students(Utc::now()).remove(0)
    }

    #[test]
    fn contest_chain_is_consistent() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let contests = contest_history(&alex(), &mut rng, Utc::now());

            assert_eq!(contests.len(), CONTEST_COUNT as usize);
            assert_eq!(contests[0].old_rating, STARTING_RATING);
            for pair in contests.windows(2) {
                assert_eq!(pair[0].new_rating, pair[1].old_rating);
                assert!(pair[0].time_seconds < pair[1].time_seconds);
            }
            for contest in &contests {
                assert!(contest.new_rating >= RATING_FLOOR);
                assert_eq!(contest.rating_change, contest.new_rating - contest.old_rating);
                assert!((1..=6).contains(&contest.problems_solved));
                assert!(contest.unsolved_problems < 3);
            }
        }
    }

    #[test]
    fn losing_streak_clamps_at_floor() {
        // All-zero draws make every rating change the minimum, -100.
        let mut rng = StepRng::new(0, 0);
        let contests = contest_history(&alex(), &mut rng, Utc::now());

        assert_eq!(contests[3].new_rating, RATING_FLOOR);
        let clamped = &contests[4];
        assert_eq!(clamped.old_rating, RATING_FLOOR);
        assert_eq!(clamped.new_rating, RATING_FLOOR);
        assert_eq!(clamped.rating_change, 0);
        for pair in contests.windows(2) {
            assert_eq!(pair[0].new_rating, pair[1].old_rating);
        }
        for contest in &contests {
            assert_eq!(contest.rating_change, contest.new_rating - contest.old_rating);
        }
    }

    #[test]
    fn problem_stats_bands_cover_every_solve() {
        let mut rng = StdRng::seed_from_u64(7);
        for days in [7, 30, 90] {
            let stats = problem_stats(&mut rng, days);
            let banded: u32 = stats.difficulty_breakdown.values().sum();

            assert_eq!(stats.difficulty_breakdown.len(), DIFFICULTY_BANDS.len());
            assert_eq!(banded, stats.total_solved);
            assert!(stats.total_solved >= days && stats.total_solved < days * 3);
            assert!(stats.most_difficult_rating < 2300);
            assert!(stats.avg_rating >= 800);
        }
    }

    #[test]
    fn heatmap_spans_a_year_ending_today() {
        let mut rng = StdRng::seed_from_u64(3);
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let heatmap = submission_heatmap(&mut rng, today);

        assert_eq!(heatmap.len(), HEATMAP_DAYS as usize);
        assert_eq!(heatmap.last().unwrap().date, today);
        assert_eq!(heatmap[0].date, today - Duration::days(364));
        assert!(heatmap.windows(2).all(|w| w[1].date == w[0].date + Duration::days(1)));
        assert!(heatmap.iter().all(|day| day.count < 10));
    }

    #[test]
    fn profile_rating_history_tracks_contests() {
        let mut rng = StdRng::seed_from_u64(11);
        let student = alex();
        let profile = generate_profile(&student, &mut rng, Utc::now());

        assert_eq!(profile.student, student);
        let contests = &profile.contest_history.contests;
        let history = &profile.contest_history.rating_history;
        assert_eq!(history.len(), contests.len());
        assert_eq!(
            history.last().unwrap().rating,
            contests.last().unwrap().new_rating
        );
        assert!(contests.iter().all(|c| c.student_id == student.id));
    }
}
