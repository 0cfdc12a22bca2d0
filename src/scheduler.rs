//! Daily trigger that launches the pipeline as a child process.
//!
//! The loop wakes every poll interval, launches the pipeline when the trigger
//! is due, and reaps children that have exited. Missed triggers are not
//! replayed: the next due instant is always computed from the current time.

use crate::config::OverlapPolicy;
use crate::constants::PIPELINE_BIN_NAME;
use crate::error::{EtlError, Result};
use chrono::{DateTime, Local, NaiveTime, Timelike};
use cron::Schedule;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A fixed local wall-clock time, once per day.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    at: NaiveTime,
    expression: String,
    schedule: Schedule,
    next_due: Option<DateTime<Local>>,
}

impl ScheduleEntry {
    /// Parse `HH:MM` and compute the first due instant after now.
    pub fn daily_at(at: &str) -> Result<Self> {
        Self::daily_at_from(at, Local::now())
    }

    pub fn daily_at_from(at: &str, now: DateTime<Local>) -> Result<Self> {
        let time = NaiveTime::parse_from_str(at.trim(), "%H:%M").map_err(|e| {
            EtlError::Schedule(format!("invalid trigger time '{}' (expected HH:MM): {}", at, e))
        })?;
        let expression = format!("0 {} {} * * *", time.minute(), time.hour());
        let schedule = Schedule::from_str(&expression).map_err(|e| {
            EtlError::Schedule(format!("invalid cron expression '{}': {}", expression, e))
        })?;
        let next_due = schedule.after(&now).next();
        Ok(Self {
            at: time,
            expression,
            schedule,
            next_due,
        })
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_due(&self) -> Option<DateTime<Local>> {
        self.next_due
    }

    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        matches!(self.next_due, Some(next) if next <= now)
    }

    /// Move the due instant to the first trigger strictly after `now`.
    pub fn advance(&mut self, now: DateTime<Local>) {
        self.next_due = self.schedule.after(&now).next();
    }
}

/// How to launch one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl PipelineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// The configured binary, else `weather-etl` next to the running executable,
/// else `weather-etl` looked up on `PATH`.
pub fn resolve_pipeline_bin(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    let file_name = format!("{}{}", PIPELINE_BIN_NAME, std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(file_name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    SkippedOverlap,
    SpawnFailed,
}

pub struct Scheduler {
    entry: ScheduleEntry,
    command: PipelineCommand,
    poll_interval: Duration,
    overlap: OverlapPolicy,
    running: Vec<Child>,
    runs_started: usize,
}

impl Scheduler {
    pub fn new(
        entry: ScheduleEntry,
        command: PipelineCommand,
        poll_interval: Duration,
        overlap: OverlapPolicy,
    ) -> Self {
        Self {
            entry,
            command,
            poll_interval,
            overlap,
            running: Vec::new(),
            runs_started: 0,
        }
    }

    pub fn runs_started(&self) -> usize {
        self.runs_started
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Poll until `cancel` fires. With `run_now`, one run is launched before
    /// the first poll.
    pub async fn run(&mut self, cancel: CancellationToken, run_now: bool) -> Result<()> {
        info!(
            at = %self.entry.at().format("%H:%M"),
            cron = self.entry.expression(),
            "Scheduler started. Press Ctrl+C to stop."
        );
        if let Some(next) = self.entry.next_due() {
            info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S"));
        }
        if run_now {
            self.trigger();
        }

        loop {
            self.reap();

            let now = Local::now();
            if self.entry.is_due(now) {
                self.trigger();
                self.entry.advance(now);
                if let Some(next) = self.entry.next_due() {
                    info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S"));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.reap();
        if !self.running.is_empty() {
            warn!(
                "Scheduler stopping with {} pipeline run(s) still in progress",
                self.running.len()
            );
        }
        info!(runs = self.runs_started, "Scheduler stopped");
        Ok(())
    }

    /// Launch one pipeline run, honouring the overlap policy.
    pub fn trigger(&mut self) -> TriggerOutcome {
        self.reap();
        if self.overlap == OverlapPolicy::Skip && !self.running.is_empty() {
            warn!(
                "Previous pipeline run still in progress; skipping this trigger"
            );
            return TriggerOutcome::SkippedOverlap;
        }

        info!(
            "Running ETL pipeline at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        match Command::new(&self.command.program)
            .args(&self.command.args)
            .spawn()
        {
            Ok(child) => {
                info!(pid = child.id(), "Started {}", self.command.program.display());
                self.running.push(child);
                self.runs_started += 1;
                TriggerOutcome::Started
            }
            Err(e) => {
                error!(
                    "Failed to start pipeline '{}': {}",
                    self.command.program.display(),
                    e
                );
                TriggerOutcome::SpawnFailed
            }
        }
    }

    /// Collect exit statuses of finished children without blocking.
    pub fn reap(&mut self) {
        self.running.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                info!(outcome = "success", "Pipeline run finished: {}", status);
                false
            }
            Ok(Some(status)) => {
                warn!("Pipeline run exited with {}", status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!("Could not poll pipeline run: {}", e);
                false
            }
        });
    }

    /// Wait for every running child to exit.
    pub async fn wait_all(&mut self) {
        for mut child in self.running.drain(..) {
            match child.wait().await {
                Ok(status) => info!("Pipeline run finished: {}", status),
                Err(e) => error!("Could not wait for pipeline run: {}", e),
            }
        }
    }
}

/// Cancel `token` on Ctrl-C or, on Unix, SIGTERM.
pub fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Could not install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn test_daily_entry_builds_cron_expression() {
        let entry = ScheduleEntry::daily_at_from("13:00", local(2024, 1, 5, 9, 0)).unwrap();
        assert_eq!(entry.expression(), "0 0 13 * * *");
        assert_eq!(entry.next_due(), Some(local(2024, 1, 5, 13, 0)));

        let later = ScheduleEntry::daily_at_from("07:45", local(2024, 1, 5, 9, 0)).unwrap();
        assert_eq!(later.expression(), "0 45 7 * * *");
        assert_eq!(later.next_due(), Some(local(2024, 1, 6, 7, 45)));
    }

    #[test]
    fn test_invalid_time_is_rejected() {
        assert!(matches!(ScheduleEntry::daily_at("25:00"), Err(EtlError::Schedule(_))));
        assert!(matches!(ScheduleEntry::daily_at("1pm"), Err(EtlError::Schedule(_))));
    }

    #[test]
    fn test_due_and_advance_without_catch_up() {
        let mut entry = ScheduleEntry::daily_at_from("13:00", local(2024, 1, 5, 9, 0)).unwrap();
        assert!(!entry.is_due(local(2024, 1, 5, 12, 59)));
        assert!(entry.is_due(local(2024, 1, 5, 13, 0)));

        // Three days late: one run, then the next trigger after now
        let late = local(2024, 1, 8, 14, 0);
        assert!(entry.is_due(late));
        entry.advance(late);
        assert_eq!(entry.next_due(), Some(local(2024, 1, 9, 13, 0)));
        assert!(!entry.is_due(late + ChronoDuration::hours(1)));
    }

    #[test]
    fn test_configured_pipeline_bin_wins() {
        let bin = resolve_pipeline_bin(Some(Path::new("/opt/etl/weather-etl")));
        assert_eq!(bin, PathBuf::from("/opt/etl/weather-etl"));
        let default = resolve_pipeline_bin(None);
        assert!(default.to_string_lossy().contains(PIPELINE_BIN_NAME));
    }

    #[tokio::test]
    async fn test_run_now_then_cancel() {
        let entry = ScheduleEntry::daily_at("13:00").unwrap();
        let command = PipelineCommand::new(std::env::current_exe().unwrap()).arg("--help");
        let mut scheduler = Scheduler::new(
            entry,
            command,
            Duration::from_millis(10),
            OverlapPolicy::Allow,
        );
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });
        scheduler.run(cancel, true).await.unwrap();
        scheduler.wait_all().await;
        assert!(scheduler.runs_started() >= 1);
        assert_eq!(scheduler.running(), 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_logged_not_fatal() {
        let entry = ScheduleEntry::daily_at("13:00").unwrap();
        let mut scheduler = Scheduler::new(
            entry,
            PipelineCommand::new("/definitely/not/a/pipeline"),
            Duration::from_secs(60),
            OverlapPolicy::Allow,
        );
        assert_eq!(scheduler.trigger(), TriggerOutcome::SpawnFailed);
        assert_eq!(scheduler.runs_started(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_skip_policy_skips_while_running() {
        let entry = ScheduleEntry::daily_at("13:00").unwrap();
        let command = PipelineCommand::new("sleep").arg("1");
        let mut scheduler = Scheduler::new(entry, command, Duration::from_secs(60), OverlapPolicy::Skip);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        assert_eq!(scheduler.trigger(), TriggerOutcome::SkippedOverlap);
        scheduler.wait_all().await;
        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        scheduler.wait_all().await;
        assert_eq!(scheduler.runs_started(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_allow_policy_overlaps() {
        let entry = ScheduleEntry::daily_at("13:00").unwrap();
        let command = PipelineCommand::new("sleep").arg("1");
        let mut scheduler = Scheduler::new(entry, command, Duration::from_secs(60), OverlapPolicy::Allow);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        assert_eq!(scheduler.running(), 2);
        scheduler.wait_all().await;
    }
}
