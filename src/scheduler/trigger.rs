//! Daily schedule trigger
//!
//! Wakes once a day at a configured local wall-clock time and runs the
//! [`ScheduleGenerator`]. A failed run is logged and the loop carries on
//! to the next day.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use super::error::{SchedulerError, SchedulerResult};
use super::generator::{GenerationReport, ScheduleGenerator, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
use crate::error::Result;

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Configuration for the schedule trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Whether the daily loop runs at all
    pub enabled: bool,

    /// Local time of the daily run (24h format, e.g. "00:00")
    pub run_time: String,

    /// Days ahead each run schedules collections for
    pub horizon_days: i64,

    /// Run once immediately when the loop starts
    pub trigger_on_startup: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_time: "00:00".to_string(),
            horizon_days: DEFAULT_HORIZON_DAYS,
            trigger_on_startup: false,
        }
    }
}

impl TriggerConfig {
    /// Create a new config builder
    pub fn builder() -> TriggerConfigBuilder {
        TriggerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        self.parse_run_time()?;

        if !(0..=MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            return Err(SchedulerError::invalid_horizon(self.horizon_days));
        }

        Ok(())
    }

    /// Parse the run time
    pub fn parse_run_time(&self) -> SchedulerResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.run_time, "%H:%M").map_err(|_| {
            SchedulerError::trigger_config(
                "run_time",
                format!("Invalid time format '{}'. Expected HH:MM", self.run_time),
            )
        })
    }
}

/// Builder for TriggerConfig
#[derive(Debug, Default)]
pub struct TriggerConfigBuilder {
    enabled: Option<bool>,
    run_time: Option<String>,
    horizon_days: Option<i64>,
    trigger_on_startup: Option<bool>,
}

impl TriggerConfigBuilder {
    pub fn enabled(mut self, value: bool) -> Self {
        self.enabled = Some(value);
        self
    }

    pub fn run_time(mut self, time: impl Into<String>) -> Self {
        self.run_time = Some(time.into());
        self
    }

    pub fn horizon_days(mut self, days: i64) -> Self {
        self.horizon_days = Some(days);
        self
    }

    pub fn trigger_on_startup(mut self, value: bool) -> Self {
        self.trigger_on_startup = Some(value);
        self
    }

    /// Build and validate the config
    pub fn build(self) -> SchedulerResult<TriggerConfig> {
        let defaults = TriggerConfig::default();
        let config = TriggerConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            run_time: self.run_time.unwrap_or(defaults.run_time),
            horizon_days: self.horizon_days.unwrap_or(defaults.horizon_days),
            trigger_on_startup: self.trigger_on_startup.unwrap_or(defaults.trigger_on_startup),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Next instant strictly after `now` whose wall-clock time is `run_time`.
///
/// A run time skipped by a DST gap moves to the following day; an
/// ambiguous one resolves to its earlier occurrence.
pub fn next_run_after<Tz: TimeZone>(
    now: &DateTime<Tz>,
    run_time: NaiveTime,
) -> SchedulerResult<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let candidate = (today + Duration::days(offset)).and_time(run_time);
        if let Some(at) = tz.from_local_datetime(&candidate).earliest() {
            if at > *now {
                return Ok(at);
            }
        }
    }

    Err(SchedulerError::NonexistentLocalTime {
        time: run_time.format("%H:%M").to_string(),
    })
}

// ============================================================================
// Schedule Trigger
// ============================================================================

/// Summary of the most recent run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastRun {
    pub at: DateTime<Utc>,
    pub horizon_days: i64,
    pub created: usize,
    pub failed: usize,
}

/// Recurring timer driving the schedule generator
pub struct ScheduleTrigger {
    config: TriggerConfig,
    generator: Arc<ScheduleGenerator>,
    is_running: AtomicBool,
    stop_signal: Notify,
    last_run: RwLock<Option<LastRun>>,
}

impl ScheduleTrigger {
    /// Create a new schedule trigger
    pub fn new(config: TriggerConfig, generator: Arc<ScheduleGenerator>) -> SchedulerResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            generator,
            is_running: AtomicBool::new(false),
            stop_signal: Notify::new(),
            last_run: RwLock::new(None),
        })
    }

    /// Create with default config
    pub fn with_defaults(generator: Arc<ScheduleGenerator>) -> SchedulerResult<Self> {
        Self::new(TriggerConfig::default(), generator)
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Duration from `now` until the next daily run
    pub fn duration_until_next_run(&self, now: DateTime<Local>) -> SchedulerResult<Duration> {
        let run_time = self.config.parse_run_time()?;
        let next = next_run_after(&now, run_time)?;
        Ok(next.signed_duration_since(now))
    }

    /// Run the generator once with the configured horizon
    pub async fn run_now(&self) -> Result<GenerationReport> {
        self.run_with_horizon(self.config.horizon_days).await
    }

    /// Run the generator once with an explicit horizon.
    ///
    /// The work runs on the blocking pool and the outcome is recorded as
    /// the last run, whichever caller asked for it.
    pub async fn run_with_horizon(&self, horizon_days: i64) -> Result<GenerationReport> {
        let generator = self.generator.clone();

        let report = tokio::task::spawn_blocking(move || generator.ensure_schedules(horizon_days))
            .await
            .map_err(|e| SchedulerError::execution_failed(e.to_string()))??;

        *self.last_run.write().await = Some(LastRun {
            at: Utc::now(),
            horizon_days,
            created: report.created.len(),
            failed: report.failures.len(),
        });

        Ok(report)
    }

    /// Start the trigger loop (runs until stopped)
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::execution_failed("trigger already running"));
        }

        tracing::info!(
            run_time = %self.config.run_time,
            horizon_days = self.config.horizon_days,
            "Schedule trigger started"
        );

        if self.config.trigger_on_startup {
            self.run_logged().await;
        }

        while self.is_running.load(Ordering::SeqCst) {
            let sleep_duration = match self.duration_until_next_run(Local::now()) {
                Ok(d) => d,
                Err(e) => {
                    self.is_running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };

            tracing::debug!(seconds = sleep_duration.num_seconds(), "Next schedule run");

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration.to_std().unwrap_or(std::time::Duration::from_secs(60))) => {
                    self.run_logged().await;
                }
                _ = self.stop_signal.notified() => {
                    break;
                }
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
        tracing::info!("Schedule trigger stopped");
        Ok(())
    }

    /// Stop the trigger loop
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.stop_signal.notify_one();
    }

    /// Check if trigger is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    async fn run_logged(&self) {
        match self.run_now().await {
            Ok(report) if !report.is_complete() => {
                tracing::warn!(
                    created = report.created.len(),
                    failed = report.failures.len(),
                    "Scheduled run finished with failures"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Scheduled run failed"),
        }
    }

    /// Get trigger status
    pub async fn status(&self) -> TriggerStatus {
        TriggerStatus {
            is_running: self.is_running(),
            config: self.config.clone(),
            seconds_until_next_run: self
                .duration_until_next_run(Local::now())
                .ok()
                .map(|d| d.num_seconds()),
            last_run: self.last_run.read().await.clone(),
        }
    }
}

/// Trigger status information
#[derive(Debug, Clone, Serialize)]
pub struct TriggerStatus {
    pub is_running: bool,
    pub config: TriggerConfig,
    pub seconds_until_next_run: Option<i64>,
    pub last_run: Option<LastRun>,
}

impl TriggerStatus {
    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = String::from("Trigger Status\n");
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("Running: {}\n", self.is_running));
        output.push_str(&format!("Run Time: {}\n", self.config.run_time));
        output.push_str(&format!("Horizon: {} days\n", self.config.horizon_days));

        if let Some(secs) = self.seconds_until_next_run {
            let hours = secs / 3600;
            let mins = (secs % 3600) / 60;
            output.push_str(&format!("Until Next Run: {hours}h {mins}m\n"));
        }

        match &self.last_run {
            Some(run) => output.push_str(&format!(
                "Last Run: {} ({} days ahead, {} created, {} failed)\n",
                run.at.to_rfc3339(),
                run.horizon_days,
                run.created,
                run.failed
            )),
            None => output.push_str("Last Run: never\n"),
        }

        output
    }
}

// ============================================================================
// Tests
// ============================================================================
