//! Sync schedule settings, the recurring maintenance tasks, and the system
//! status derived from them.
//!
//! Nothing here spawns timers. Tasks run when a caller asks, and the
//! registry only tracks their state and when each would fire next.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Student, SyncStatus, SystemStats};

pub const SYNC_TASK_ID: Uuid = Uuid::from_u128(0x5e1c0a7e_0d2b_4c61_9a43_71d2f0b8e101);
pub const REMINDER_TASK_ID: Uuid = Uuid::from_u128(0x5e1c0a7e_0d2b_4c61_9a43_71d2f0b8e102);
pub const CLEANUP_TASK_ID: Uuid = Uuid::from_u128(0x5e1c0a7e_0d2b_4c61_9a43_71d2f0b8e103);
pub const BACKUP_TASK_ID: Uuid = Uuid::from_u128(0x5e1c0a7e_0d2b_4c61_9a43_71d2f0b8e104);

/// Monthly tasks stop at the 28th so every month has the day.
pub const MAX_DAY_OF_MONTH: u32 = 28;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid sync time {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("invalid timezone {0:?}, expected UTC or an offset like +05:30")]
    InvalidTimezone(String),

    #[error("custom sync interval must be at least one hour")]
    InvalidInterval,

    #[error("day of month {0} is outside 1-28")]
    InvalidDayOfMonth(u32),

    #[error("task name is required")]
    BlankTaskName,

    #[error("scheduled task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("scheduled task {0} is already running")]
    TaskRunning(Uuid),

    #[error("scheduled task {0} is not running")]
    TaskNotRunning(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

/// When something recurs: a wall-clock time in a fixed offset, repeated
/// daily, weekly, monthly, or every few hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cadence {
    pub frequency: Frequency,
    /// Local wall-clock time in `HH:MM`.
    pub time: String,
    pub timezone: String,
    /// Only read for weekly cadences.
    pub weekday: Weekday,
    /// Only read for monthly cadences.
    pub day_of_month: u32,
    /// Only read for custom cadences.
    pub custom_interval_hours: u32,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            time: "02:00".to_string(),
            timezone: "UTC".to_string(),
            weekday: Weekday::Mon,
            day_of_month: 1,
            custom_interval_hours: 12,
        }
    }
}

impl Cadence {
    fn at(frequency: Frequency, time: &str) -> Self {
        Self {
            frequency,
            time: time.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        parse_time(&self.time)?;
        parse_timezone(&self.timezone)?;
        match self.frequency {
            Frequency::Custom if self.custom_interval_hours == 0 => {
                Err(ScheduleError::InvalidInterval)
            }
            Frequency::Monthly if !(1..=MAX_DAY_OF_MONTH).contains(&self.day_of_month) => {
                Err(ScheduleError::InvalidDayOfMonth(self.day_of_month))
            }
            _ => Ok(()),
        }
    }

    pub fn describe(&self) -> String {
        match self.frequency {
            Frequency::Daily => format!("daily at {} {}", self.time, self.timezone),
            Frequency::Weekly => format!(
                "weekly on {} at {} {}",
                self.weekday, self.time, self.timezone
            ),
            Frequency::Monthly => format!(
                "monthly on day {} at {} {}",
                self.day_of_month, self.time, self.timezone
            ),
            Frequency::Custom => format!("every {} hours", self.custom_interval_hours),
        }
    }

    /// The first firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        self.validate()?;
        if self.frequency == Frequency::Custom {
            return Ok(now + Duration::hours(i64::from(self.custom_interval_hours)));
        }

        let time = parse_time(&self.time)?;
        let offset = parse_timezone(&self.timezone)?;
        let local_today = now.with_timezone(&offset).date_naive();
        let localize = |date: NaiveDate| {
            offset
                .from_local_datetime(&date.and_time(time))
                .single()
                .map(|at| at.with_timezone(&Utc))
                .ok_or_else(|| ScheduleError::InvalidTimezone(self.timezone.clone()))
        };

        let next = match self.frequency {
            Frequency::Weekly => {
                let ahead = (7 + self.weekday.num_days_from_monday()
                    - local_today.weekday().num_days_from_monday())
                    % 7;
                let candidate = localize(local_today + Duration::days(i64::from(ahead)))?;
                if candidate <= now {
                    candidate + Duration::weeks(1)
                } else {
                    candidate
                }
            }
            Frequency::Monthly => {
                let day = self.day_of_month;
                let this_month = month_day(local_today.year(), local_today.month(), day)?;
                let candidate = localize(this_month)?;
                if candidate <= now {
                    let (year, month) = if local_today.month() == 12 {
                        (local_today.year() + 1, 1)
                    } else {
                        (local_today.year(), local_today.month() + 1)
                    };
                    localize(month_day(year, month, day)?)?
                } else {
                    candidate
                }
            }
            _ => {
                let candidate = localize(local_today)?;
                if candidate <= now {
                    candidate + Duration::days(1)
                } else {
                    candidate
                }
            }
        };
        Ok(next)
    }
}

fn month_day(year: i32, month: u32, day: u32) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ScheduleError::InvalidDayOfMonth(day))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    #[serde(flatten)]
    pub cadence: Cadence,
    pub auto_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cadence: Cadence::default(),
            auto_sync: true,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.cadence.validate()
    }

    pub fn describe(&self) -> String {
        self.cadence.describe()
    }
}

pub fn parse_time(value: &str) -> Result<NaiveTime, ScheduleError> {
    let invalid = || ScheduleError::InvalidTime(value.to_string());
    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

pub fn parse_timezone(value: &str) -> Result<FixedOffset, ScheduleError> {
    let invalid = || ScheduleError::InvalidTimezone(value.to_string());
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let time = parse_time(rest).map_err(|_| invalid())?;
    let seconds = time.num_seconds_from_midnight() as i32;
    if seconds > 14 * 3600 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * seconds).ok_or_else(invalid)
}

/// When the next automatic sync would fire, or `None` with auto-sync off.
pub fn next_sync_at(
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    if !config.auto_sync {
        return Ok(None);
    }
    config.cadence.next_after(now).map(Some)
}

pub fn system_stats(
    students: &[Student],
    sync_status: SyncStatus,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<SystemStats, ScheduleError> {
    let active_students = students.iter().filter(|s| s.is_active).count();

    Ok(SystemStats {
        total_students: students.len(),
        active_students,
        inactive_students: students.len() - active_students,
        last_sync_at: students.iter().map(|s| s.last_sync_at).max(),
        next_sync_at: next_sync_at(config, now)?,
        sync_status,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Sync,
    Email,
    Cleanup,
    Backup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTask {
    pub id: Uuid,
    pub name: String,
    pub kind: TaskKind,
    pub cadence: Cadence,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub status: TaskStatus,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub kind: TaskKind,
    pub cadence: Cadence,
    pub enabled: bool,
    pub description: String,
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub kind: Option<TaskKind>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub time: Option<String>,
    pub timezone: Option<String>,
    pub weekday: Option<Weekday>,
    pub day_of_month: Option<u32>,
    pub custom_interval_hours: Option<u32>,
}

impl TaskPatch {
    fn apply_to(self, task: &mut ScheduleTask) {
        let cadence = &mut task.cadence;
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(kind) = self.kind {
            task.kind = kind;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(frequency) = self.frequency {
            cadence.frequency = frequency;
        }
        if let Some(time) = self.time {
            cadence.time = time;
        }
        if let Some(timezone) = self.timezone {
            cadence.timezone = timezone;
        }
        if let Some(weekday) = self.weekday {
            cadence.weekday = weekday;
        }
        if let Some(day) = self.day_of_month {
            cadence.day_of_month = day;
        }
        if let Some(hours) = self.custom_interval_hours {
            cadence.custom_interval_hours = hours;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    pub enabled: usize,
    pub running: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<ScheduleTask>,
}

impl TaskRegistry {
    /// The four maintenance jobs every session starts with.
    pub fn seeded(now: DateTime<Utc>) -> Result<Self, ScheduleError> {
        let seeds = vec![
            (
                SYNC_TASK_ID,
                "Daily Student Sync",
                TaskKind::Sync,
                Cadence::at(Frequency::Daily, "02:00"),
                true,
                Some(now),
                TaskStatus::Completed,
                "Sync all student data from the contest platform",
            ),
            (
                REMINDER_TASK_ID,
                "Inactivity Email Reminders",
                TaskKind::Email,
                Cadence::at(Frequency::Daily, "09:00"),
                true,
                Some(now - Duration::hours(2)),
                TaskStatus::Idle,
                "Send email reminders to inactive students",
            ),
            (
                CLEANUP_TASK_ID,
                "Weekly Data Cleanup",
                TaskKind::Cleanup,
                Cadence {
                    weekday: Weekday::Sun,
                    ..Cadence::at(Frequency::Weekly, "01:00")
                },
                false,
                None,
                TaskStatus::Idle,
                "Clean up old logs and temporary data",
            ),
            (
                BACKUP_TASK_ID,
                "Monthly Database Backup",
                TaskKind::Backup,
                Cadence::at(Frequency::Monthly, "00:00"),
                true,
                Some(now - Duration::days(15)),
                TaskStatus::Idle,
                "Create backup of all student and system data",
            ),
        ];

        let mut tasks = Vec::with_capacity(seeds.len());
        for (id, name, kind, cadence, enabled, last_run, status, description) in seeds {
            let next_run = cadence.next_after(now)?;
            tasks.push(ScheduleTask {
                id,
                name: name.to_string(),
                kind,
                cadence,
                enabled,
                last_run,
                next_run,
                status,
                description: description.to_string(),
            });
        }
        Ok(Self { tasks })
    }

    pub fn list(&self) -> &[ScheduleTask] {
        &self.tasks
    }

    #[cfg(test)]
    pub fn get(&self, id: Uuid) -> Option<&ScheduleTask> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn add(
        &mut self,
        input: NewTask,
        now: DateTime<Utc>,
    ) -> Result<ScheduleTask, ScheduleError> {
        if input.name.trim().is_empty() {
            return Err(ScheduleError::BlankTaskName);
        }
        let next_run = input.cadence.next_after(now)?;
        let task = ScheduleTask {
            id: Uuid::new_v4(),
            name: input.name,
            kind: input.kind,
            cadence: input.cadence,
            enabled: input.enabled,
            last_run: None,
            next_run,
            status: TaskStatus::Idle,
            description: input.description,
        };
        tracing::info!("Scheduled task {} ({:?})", task.name, task.kind);
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// A rejected edit leaves the task untouched.
    pub fn edit(
        &mut self,
        id: Uuid,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<ScheduleTask, ScheduleError> {
        let slot = self.find_mut(id)?;
        let mut updated = slot.clone();
        patch.apply_to(&mut updated);
        if updated.name.trim().is_empty() {
            return Err(ScheduleError::BlankTaskName);
        }
        updated.next_run = updated.cadence.next_after(now)?;
        *slot = updated.clone();
        tracing::info!("Edited scheduled task {}", updated.name);
        Ok(updated)
    }

    /// Flips `enabled`. A task switched back on is rescheduled from `now`.
    pub fn toggle(
        &mut self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScheduleTask, ScheduleError> {
        let slot = self.find_mut(id)?;
        if !slot.enabled {
            slot.next_run = slot.cadence.next_after(now)?;
        }
        slot.enabled = !slot.enabled;
        tracing::info!(
            "{} scheduled task {}",
            if slot.enabled { "Enabled" } else { "Disabled" },
            slot.name
        );
        Ok(slot.clone())
    }

    /// Marks a task running. Disabled tasks can still be run by hand.
    pub fn start_run(
        &mut self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScheduleTask, ScheduleError> {
        let slot = self.find_mut(id)?;
        if slot.status == TaskStatus::Running {
            return Err(ScheduleError::TaskRunning(id));
        }
        slot.status = TaskStatus::Running;
        slot.last_run = Some(now);
        tracing::info!("Running scheduled task {}", slot.name);
        Ok(slot.clone())
    }

    pub fn finish_run(
        &mut self,
        id: Uuid,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> Result<ScheduleTask, ScheduleError> {
        let slot = self.find_mut(id)?;
        if slot.status != TaskStatus::Running {
            return Err(ScheduleError::TaskNotRunning(id));
        }
        slot.next_run = slot.cadence.next_after(now)?;
        slot.status = if succeeded {
            TaskStatus::Completed
        } else {
            tracing::warn!("Scheduled task {} failed", slot.name);
            TaskStatus::Failed
        };
        Ok(slot.clone())
    }

    pub fn remove(&mut self, id: Uuid) -> Option<ScheduleTask> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        let task = self.tasks.remove(index);
        tracing::info!("Deleted scheduled task {}", task.name);
        Some(task)
    }

    pub fn summary(&self) -> TaskSummary {
        let with_status = |status| self.tasks.iter().filter(|t| t.status == status).count();
        TaskSummary {
            total: self.tasks.len(),
            enabled: self.tasks.iter().filter(|t| t.enabled).count(),
            running: with_status(TaskStatus::Running),
            failed: with_status(TaskStatus::Failed),
        }
    }

    /// Enabled tasks whose next run falls within `window` of `now`,
    /// soonest first. Overdue tasks are included.
    pub fn due_within(&self, now: DateTime<Utc>, window: Duration) -> Vec<&ScheduleTask> {
        let horizon = now + window;
        let mut due: Vec<&ScheduleTask> = self
            .tasks
            .iter()
            .filter(|task| task.enabled && task.next_run <= horizon)
            .collect();
        due.sort_by_key(|task| task.next_run);
        due
    }

    fn find_mut(&mut self, id: Uuid) -> Result<&mut ScheduleTask, ScheduleError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(ScheduleError::TaskNotFound(id))
    }
}
