use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, Utc, Weekday};
use clap::{ArgAction, Args, Parser, Subcommand};
use uuid::Uuid;

mod analytics;
mod config;
mod error;
mod generator;
mod logging;
mod models;
mod reminders;
mod report;
mod roster;
mod schedule;
mod shell;
mod source;
mod store;
mod validation;

use analytics::{SortDirection, SortField};
use config::Settings;
use error::StoreError;
use models::{NewStudent, Student, StudentPatch, StudentProfile};
use schedule::{
    Cadence, Frequency, NewTask, ScheduleError, ScheduleTask, TaskKind, TaskPatch, TaskRegistry,
};
use source::SimulatedSource;
use store::{StudentStore, SyncOutcome};

#[derive(Parser)]
#[command(name = "cp-student-tracker")]
#[command(about = "Roster, rating and activity tracker for competitive-programming students", long_about = None)]
struct Cli {
    /// Start the session from a CSV roster instead of the demo roster
    #[arg(long, global = true)]
    roster: Option<PathBuf>,
    /// JSON settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Skip the simulated backend latency
    #[arg(long, global = true)]
    instant: bool,
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List students
    List {
        #[arg(long, value_enum)]
        sort: Option<SortField>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Add a student
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        handle: String,
        #[arg(long, default_value_t = 1200)]
        rating: i32,
        #[arg(long)]
        max_rating: Option<i32>,
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        no_auto_email: bool,
    },
    /// Change fields on a student
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        rating: Option<i32>,
        #[arg(long)]
        max_rating: Option<i32>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        inactivity_days: Option<u32>,
        #[arg(long)]
        auto_email_disabled: Option<bool>,
    },
    /// Remove a student
    Remove { id: Uuid },
    /// Show a student's contest history and solve statistics
    Profile {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Refresh one student's rating
    Sync { id: Uuid },
    /// Refresh every student's rating
    SyncAll,
    /// Roster-wide rating and activity summary
    Analytics,
    /// Students due an inactivity reminder
    Reminders {
        /// Count a reminder as sent for each listed student
        #[arg(long)]
        record: bool,
    },
    /// Sync schedule, system status and scheduled tasks
    Schedule {
        #[command(subcommand)]
        action: Option<ScheduleAction>,
    },
    /// Write a markdown progress report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Read commands from stdin, one per line, against a single session
    Shell,
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Sync settings, system status and task counts
    Status,
    /// List scheduled tasks
    Tasks {
        #[arg(long)]
        json: bool,
    },
    /// Enabled tasks due in the next 24 hours
    Upcoming,
    /// Enable or disable a task
    Toggle { id: Uuid },
    /// Run a task now
    Run { id: Uuid },
    /// Delete a task
    Remove { id: Uuid },
    /// Add a task
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        kind: TaskKind,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        disabled: bool,
        #[command(flatten)]
        cadence: CadenceArgs,
    },
    /// Change a task
    Edit {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum)]
        kind: Option<TaskKind>,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        cadence: CadenceArgs,
    },
}

#[derive(Args)]
struct CadenceArgs {
    #[arg(long, value_enum)]
    frequency: Option<Frequency>,
    /// Local time as HH:MM
    #[arg(long)]
    time: Option<String>,
    /// UTC or an offset like +05:30
    #[arg(long)]
    timezone: Option<String>,
    #[arg(long)]
    weekday: Option<Weekday>,
    #[arg(long)]
    day_of_month: Option<u32>,
    #[arg(long)]
    interval_hours: Option<u32>,
}

impl CadenceArgs {
    fn into_patch(self) -> TaskPatch {
        TaskPatch {
            frequency: self.frequency,
            time: self.time,
            timezone: self.timezone,
            weekday: self.weekday,
            day_of_month: self.day_of_month,
            custom_interval_hours: self.interval_hours,
            ..TaskPatch::default()
        }
    }

    fn into_cadence(self) -> Cadence {
        let defaults = Cadence::default();
        Cadence {
            frequency: self.frequency.unwrap_or(defaults.frequency),
            time: self.time.unwrap_or(defaults.time),
            timezone: self.timezone.unwrap_or(defaults.timezone),
            weekday: self.weekday.unwrap_or(defaults.weekday),
            day_of_month: self.day_of_month.unwrap_or(defaults.day_of_month),
            custom_interval_hours: self.interval_hours.unwrap_or(defaults.custom_interval_hours),
        }
    }
}

/// Everything one CLI invocation or shell session works on.
struct Session {
    store: StudentStore<SimulatedSource>,
    tasks: TaskRegistry,
    settings: Settings,
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let settings = Settings::load(cli.settings.as_deref()).context("failed to load settings")?;
    let source = if cli.instant {
        SimulatedSource::instant().with_failure_rate(settings.latency.sync_failure_rate)
    } else {
        SimulatedSource::from_settings(&settings.latency)
    };

    let store = match &cli.roster {
        Some(path) => {
            let mut store = StudentStore::new(source);
            for row in roster::load_csv(path)? {
                let handle = row.handle.clone();
                store
                    .add(row)
                    .with_context(|| format!("rejected roster entry {handle}"))?;
            }
            store
        }
        None => StudentStore::seeded(source, Utc::now()),
    };
    tracing::info!("Session started with {} students", store.len());

    let mut session = Session {
        store,
        tasks: TaskRegistry::seeded(Utc::now())?,
        settings,
    };

    match cli.command {
        Commands::Shell => shell::run(&mut session, std::io::stdin().lock()).await,
        command => run_command(&mut session, command).await,
    }
}

async fn run_command(session: &mut Session, command: Commands) -> anyhow::Result<()> {
    let Session {
        store,
        tasks,
        settings,
    } = session;

    match command {
        Commands::List { sort, desc, json } => {
            let mut students = store.list();
            if let Some(field) = sort {
                let direction = if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                analytics::sort_students(&mut students, field, direction);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&students)?);
            } else if students.is_empty() {
                println!("No students on the roster.");
            } else {
                for student in students.iter() {
                    print_student(student);
                }
            }
        }
        Commands::Add {
            name,
            email,
            phone,
            handle,
            rating,
            max_rating,
            inactive,
            no_auto_email,
        } => {
            let student = store.add(NewStudent {
                name,
                email,
                phone,
                handle,
                current_rating: rating,
                max_rating: max_rating.unwrap_or(rating),
                last_sync_at: Utc::now(),
                is_active: !inactive,
                inactivity_days: 0,
                reminders_sent: 0,
                auto_email_disabled: no_auto_email,
            })?;
            println!("Added {} with id {}.", student.name, student.id);
        }
        Commands::Update {
            id,
            name,
            email,
            phone,
            handle,
            rating,
            max_rating,
            active,
            inactivity_days,
            auto_email_disabled,
        } => {
            let patch = StudentPatch {
                name,
                email,
                phone,
                handle,
                current_rating: rating,
                max_rating,
                is_active: active,
                inactivity_days,
                auto_email_disabled,
                ..StudentPatch::default()
            };
            if patch.is_empty() {
                println!("Nothing to update.");
                return Ok(());
            }

            match store.update(id, patch) {
                Ok(student) => {
                    println!("Updated:");
                    print_student(&student);
                }
                Err(err) if err.is_not_found() => println!("Student {id} not found."),
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Remove { id } => match store.remove(id) {
            Some(student) => println!("Removed {} ({}).", student.name, student.handle),
            None => println!("Student {id} not found; nothing removed."),
        },
        Commands::Profile { id, json } => match store.get_profile(id).await {
            Ok(profile) if json => println!("{}", serde_json::to_string_pretty(&profile)?),
            Ok(profile) => print_profile(&profile),
            Err(err) if err.is_not_found() => println!("Student {id} not found."),
            Err(err) => return Err(err.into()),
        },
        Commands::Sync { id } => match store.sync(id).await {
            Ok(student) => println!(
                "Synced {}: rating {} (max {}).",
                student.name, student.current_rating, student.max_rating
            ),
            Err(StoreError::NotFound(_)) => println!("Student {id} not found."),
            Err(err) => {
                println!("Sync status: {:?}", store.status());
                return Err(err.into());
            }
        },
        Commands::SyncAll => {
            let outcomes = store.sync_all().await;
            for (id, outcome) in outcomes.iter() {
                match outcome {
                    SyncOutcome::Synced { rating } => println!("- {id}: synced at {rating}"),
                    SyncOutcome::NotFound => println!("- {id}: no longer on the roster"),
                    SyncOutcome::Failed(message) => println!("- {id}: failed ({message})"),
                }
            }
            if let Some(message) = store.last_error() {
                println!("Last error: {message}");
            }
        }
        Commands::Analytics => {
            let students = store.list();
            let summary = analytics::summarize(
                &students,
                Utc::now(),
                settings.reminders.inactivity_threshold_days,
            );
            println!(
                "{} students ({} active, {} inactive), average rating {}",
                summary.total, summary.active, summary.inactive, summary.avg_rating
            );
            println!(
                "{} need attention, {} synced in the last 24 hours",
                summary.needing_attention, summary.recent_syncs
            );
            println!("Rating distribution:");
            for (tier, count) in analytics::tier_distribution(&students) {
                println!("- {}: {}", tier.label(), count);
            }
        }
        Commands::Reminders { record } => {
            let students = store.list();
            let due: Vec<Uuid> = reminders::reminder_candidates(&students, &settings.reminders)
                .iter()
                .map(|s| s.id)
                .collect();

            if due.is_empty() {
                println!("No reminders due.");
                return Ok(());
            }

            for id in due {
                let student = if record {
                    store.record_reminder(id)?
                } else {
                    store.get(id).ok_or(StoreError::NotFound(id))?
                };
                println!(
                    "- {} <{}> inactive {} days, {} reminders sent",
                    student.name, student.email, student.inactivity_days, student.reminders_sent
                );
            }
        }
        Commands::Schedule { action } => {
            let action = action.unwrap_or(ScheduleAction::Status);
            run_schedule(store, tasks, settings, action).await?
        }
        Commands::Report { out } => {
            let report = report::build_report(&store.list(), settings, Utc::now())?;
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Shell => println!("Already reading commands; nested shells are not supported."),
    }

    Ok(())
}

async fn run_schedule(
    store: &mut StudentStore<SimulatedSource>,
    tasks: &mut TaskRegistry,
    settings: &Settings,
    action: ScheduleAction,
) -> anyhow::Result<()> {
    let now = Utc::now();

    match action {
        ScheduleAction::Status => {
            let sync = &settings.sync;
            let stats = schedule::system_stats(&store.list(), store.status(), sync, now)?;
            println!("Sync {}", sync.describe());
            match stats.next_sync_at {
                Some(next) => println!("Next sync: {}", next.format("%Y-%m-%d %H:%M UTC")),
                None => println!("Automatic sync is off."),
            }
            if let Some(last) = stats.last_sync_at {
                println!("Last sync: {}", last.format("%Y-%m-%d %H:%M UTC"));
            }
            println!(
                "{} students ({} active, {} inactive), status {:?}",
                stats.total_students,
                stats.active_students,
                stats.inactive_students,
                stats.sync_status
            );

            let summary = tasks.summary();
            println!(
                "{} tasks: {} enabled, {} running, {} failed",
                summary.total, summary.enabled, summary.running, summary.failed
            );
        }
        ScheduleAction::Tasks { json } => {
            let listed = tasks.list();
            if json {
                println!("{}", serde_json::to_string_pretty(listed)?);
            } else if listed.is_empty() {
                println!("No scheduled tasks.");
            } else {
                for task in listed.iter() {
                    print_task(task);
                }
            }
        }
        ScheduleAction::Upcoming => {
            let due = tasks.due_within(now, Duration::hours(24));
            if due.is_empty() {
                println!("No tasks scheduled for the next 24 hours.");
            }
            for task in due {
                println!(
                    "- {} {}: {}",
                    task.next_run.format("%b %d, %H:%M"),
                    task.name,
                    task.cadence.describe()
                );
            }
        }
        ScheduleAction::Toggle { id } => match tasks.toggle(id, now) {
            Ok(task) => print_task(&task),
            Err(ScheduleError::TaskNotFound(_)) => println!("Task {id} not found."),
            Err(err) => return Err(err.into()),
        },
        ScheduleAction::Run { id } => {
            let task = match tasks.start_run(id, now) {
                Ok(task) => task,
                Err(ScheduleError::TaskNotFound(_)) => {
                    println!("Task {id} not found.");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            let succeeded = perform_task(store, settings, &task).await;
            let task = tasks.finish_run(id, succeeded, Utc::now())?;
            print_task(&task);
        }
        ScheduleAction::Remove { id } => match tasks.remove(id) {
            Some(task) => println!("Deleted {}.", task.name),
            None => println!("Task {id} not found; nothing deleted."),
        },
        ScheduleAction::Add {
            name,
            kind,
            description,
            disabled,
            cadence,
        } => {
            let task = tasks.add(
                NewTask {
                    name,
                    kind,
                    cadence: cadence.into_cadence(),
                    enabled: !disabled,
                    description,
                },
                now,
            )?;
            println!("Added task {} with id {}.", task.name, task.id);
        }
        ScheduleAction::Edit {
            id,
            name,
            kind,
            description,
            cadence,
        } => {
            let patch = TaskPatch {
                name,
                kind,
                description,
                ..cadence.into_patch()
            };
            match tasks.edit(id, patch, now) {
                Ok(task) => print_task(&task),
                Err(ScheduleError::TaskNotFound(_)) => println!("Task {id} not found."),
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

/// Does the work behind a task run. Returns whether it succeeded.
async fn perform_task(
    store: &mut StudentStore<SimulatedSource>,
    settings: &Settings,
    task: &ScheduleTask,
) -> bool {
    match task.kind {
        TaskKind::Sync => {
            let outcomes = store.sync_all().await;
            let failed = outcomes
                .iter()
                .filter(|(_, outcome)| matches!(outcome, SyncOutcome::Failed(_)))
                .count();
            println!("Synced {} students, {} failed.", outcomes.len(), failed);
            failed == 0
        }
        TaskKind::Email => {
            let students = store.list();
            let due: Vec<Uuid> = reminders::reminder_candidates(&students, &settings.reminders)
                .iter()
                .map(|s| s.id)
                .collect();

            let mut sent = 0;
            for id in due.iter() {
                match store.record_reminder(*id) {
                    Ok(_) => sent += 1,
                    Err(err) => tracing::warn!("Reminder for {} not recorded: {}", id, err),
                }
            }
            println!("Sent {} of {} reminders.", sent, due.len());
            sent == due.len()
        }
        TaskKind::Cleanup | TaskKind::Backup => {
            tracing::info!("{} has nothing to touch in an in-memory session", task.name);
            true
        }
    }
}

fn print_task(task: &ScheduleTask) {
    let last = task
        .last_run
        .map(|at| at.format("%b %d, %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "- {} {} [{:?}] {}, {:?}{}, next {}, last {}",
        task.id,
        task.name,
        task.kind,
        task.cadence.describe(),
        task.status,
        if task.enabled { "" } else { " (disabled)" },
        task.next_run.format("%b %d, %H:%M"),
        last
    );
}

fn print_student(student: &Student) {
    println!(
        "- {} {} ({}) rating {} (max {}), {}, last sync {}",
        student.id,
        student.name,
        student.handle,
        student.current_rating,
        student.max_rating,
        if student.is_active {
            "active".to_string()
        } else {
            format!("inactive {}d", student.inactivity_days)
        },
        student.last_sync_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_profile(profile: &StudentProfile) {
    let student = &profile.student;
    println!(
        "{} ({}) rating {}",
        student.name, student.handle, student.current_rating
    );

    let contests = &profile.contest_history.contests;
    println!("Contests: {}", contests.len());
    for contest in contests.iter().rev().take(5) {
        println!(
            "- {} rank {}: {} -> {} ({:+}), solved {}/{}",
            contest.contest_name,
            contest.rank,
            contest.old_rating,
            contest.new_rating,
            contest.rating_change,
            contest.problems_solved,
            contest.total_problems
        );
    }

    let windows = [
        ("7 days", &profile.problem_stats.last_7_days),
        ("30 days", &profile.problem_stats.last_30_days),
        ("90 days", &profile.problem_stats.last_90_days),
    ];
    for (label, stats) in windows {
        println!(
            "Last {}: {} solved, avg rating {}, {:.1}/day, hardest {}",
            label,
            stats.total_solved,
            stats.avg_rating,
            stats.avg_per_day,
            stats.most_difficult_rating
        );
    }

    let submissions: u32 = profile.submission_heatmap.iter().map(|d| d.count).sum();
    let active_days = profile
        .submission_heatmap
        .iter()
        .filter(|d| d.count > 0)
        .count();
    println!(
        "Past year: {} submissions over {} active days",
        submissions, active_days
    );
}
