//! Two-phase countdown state machine.
//!
//! The timer does not sleep or spawn threads. The caller owns the clock and
//! calls `tick()` once per elapsed second while a run is active.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Heating -> Cooling -> Idle
//!   ^        |          |
//!   +--------+----------+  stop()
//! ```

use chrono::{Local, NaiveDateTime};

use crate::calculator::compute_durations;
use crate::{DurationTables, Error, Phase, Result, SessionRecord, SessionSettings};

/// Outcome of a single tick
#[derive(Clone, Debug, PartialEq)]
pub enum TickResult {
    /// Still counting; show `remaining_seconds` for `phase`
    Continue { phase: Phase, remaining_seconds: u32 },
    /// Cooling ran out; the session is complete and ready to log
    Finished(SessionRecord),
}

impl TickResult {
    /// Text for the timer label
    pub fn display(&self) -> String {
        match self {
            TickResult::Continue {
                phase,
                remaining_seconds,
            } => format!("{}: {}s", phase, remaining_seconds),
            TickResult::Finished(_) => FINISHED_LABEL.to_string(),
        }
    }
}

const READY_LABEL: &str = "Ready";
const FINISHED_LABEL: &str = "Dab Now!";
const STOPPED_LABEL: &str = "Stopped";

/// How the previous run ended, for the idle label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunEnd {
    Finished,
    Stopped,
}

/// The active run, present only while the phase is not Idle
#[derive(Clone, Debug)]
struct ActiveRun {
    settings: SessionSettings,
    heat_seconds: u32,
    cool_seconds: u32,
}

#[derive(Clone, Debug)]
pub struct PhaseTimer {
    phase: Phase,
    remaining_seconds: u32,
    run: Option<ActiveRun>,
    last_end: Option<RunEnd>,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            remaining_seconds: 0,
            run: None,
            last_end: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Heat length of the active run
    pub fn heat_seconds(&self) -> Option<u32> {
        self.run.as_ref().map(|r| r.heat_seconds)
    }

    pub fn settings(&self) -> Option<&SessionSettings> {
        self.run.as_ref().map(|r| &r.settings)
    }

    /// Text for the timer label in the current state
    pub fn display(&self) -> String {
        match self.phase {
            Phase::Idle => match self.last_end {
                None => READY_LABEL.to_string(),
                Some(RunEnd::Finished) => FINISHED_LABEL.to_string(),
                Some(RunEnd::Stopped) => STOPPED_LABEL.to_string(),
            },
            phase => format!("{}: {}s", phase, self.remaining_seconds),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a run with the given settings
    ///
    /// Both durations are fixed here for the whole run. On any error the
    /// timer is left exactly as it was.
    pub fn start(&mut self, tables: &DurationTables, settings: SessionSettings) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }

        let (heat_seconds, cool_seconds) = compute_durations(tables, &settings)?;

        tracing::info!(
            "Starting run: {} / {} / {} at {:.1}x -> heat {}s, cool {}s",
            settings.material,
            settings.style,
            settings.wax,
            settings.intensity,
            heat_seconds,
            cool_seconds
        );

        self.phase = Phase::Heating;
        self.remaining_seconds = heat_seconds;
        self.run = Some(ActiveRun {
            settings,
            heat_seconds,
            cool_seconds,
        });
        Ok(())
    }

    /// Abort the current run. Nothing is recorded.
    pub fn stop(&mut self) {
        if self.is_running() {
            tracing::info!(
                "Run stopped during {} with {}s left",
                self.phase,
                self.remaining_seconds
            );
            self.last_end = Some(RunEnd::Stopped);
        }
        self.phase = Phase::Idle;
        self.remaining_seconds = 0;
        self.run = None;
    }

    /// Advance one second using the local wall clock for the record timestamp
    pub fn tick(&mut self) -> Option<TickResult> {
        self.tick_at(Local::now().naive_local())
    }

    /// Advance one second; `now` stamps the record if the run completes
    ///
    /// Returns `None` when idle.
    pub fn tick_at(&mut self, now: NaiveDateTime) -> Option<TickResult> {
        if !self.is_running() {
            return None;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return Some(self.continue_result());
        }

        match self.phase {
            Phase::Heating => {
                let cool_seconds = self.run.as_ref()?.cool_seconds;
                self.phase = Phase::Cooling;
                self.remaining_seconds = cool_seconds;
                tracing::debug!("Heat phase done, cooling for {}s", cool_seconds);
                Some(self.continue_result())
            }
            Phase::Cooling => {
                let run = self.run.take()?;
                self.phase = Phase::Idle;
                self.last_end = Some(RunEnd::Finished);

                let record = SessionRecord::completed(
                    &run.settings,
                    run.heat_seconds,
                    run.cool_seconds,
                    now,
                );
                tracing::info!("Run finished at {}", record.timestamp);
                Some(TickResult::Finished(record))
            }
            Phase::Idle => None,
        }
    }

    fn continue_result(&self) -> TickResult {
        TickResult::Continue {
            phase: self.phase,
            remaining_seconds: self.remaining_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tables_with(heat: u32, cool: u32) -> DurationTables {
        let mut tables = DurationTables::default();
        tables.material_times.insert("Test".into(), heat);
        tables.wax_cool_times.insert("Test".into(), cool);
        tables
    }

    fn test_settings() -> SessionSettings {
        SessionSettings::new("Test", "Flat Top", "Test", 1.0)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(14, 32, 0, 123_456)
            .unwrap()
    }

    fn heating(remaining_seconds: u32) -> TickResult {
        TickResult::Continue {
            phase: Phase::Heating,
            remaining_seconds,
        }
    }

    fn cooling(remaining_seconds: u32) -> TickResult {
        TickResult::Continue {
            phase: Phase::Cooling,
            remaining_seconds,
        }
    }

    #[test]
    fn test_new_timer_is_idle() {
        let mut timer = PhaseTimer::new();
        assert_eq!(timer.phase(), Phase::Idle);
        assert_eq!(timer.display(), "Ready");
        assert_eq!(timer.tick_at(now()), None);
    }

    #[test]
    fn test_short_run_tick_sequence() {
        crate::logging::init_test();
        let tables = tables_with(2, 1);
        let mut timer = PhaseTimer::new();
        timer.start(&tables, test_settings()).unwrap();

        assert_eq!(timer.display(), "Heating: 2s");
        assert_eq!(timer.tick_at(now()), Some(heating(1)));
        assert_eq!(timer.tick_at(now()), Some(cooling(1)));

        match timer.tick_at(now()) {
            Some(TickResult::Finished(record)) => {
                assert_eq!(record.heat_seconds, 2);
                assert_eq!(record.cool_seconds, 1);
                assert_eq!(record.material, "Test");
                assert_eq!(record.style, "Flat Top");
                assert_eq!(record.timestamp, now());
                assert_eq!(record.rating, None);
            }
            other => panic!("expected Finished, got {:?}", other),
        }

        assert_eq!(timer.phase(), Phase::Idle);
        assert_eq!(timer.display(), "Dab Now!");
        assert_eq!(timer.tick_at(now()), None);
    }

    #[test]
    fn test_one_second_phases_still_tick() {
        let tables = tables_with(1, 1);
        let mut timer = PhaseTimer::new();
        timer.start(&tables, test_settings()).unwrap();

        assert_eq!(timer.tick_at(now()), Some(cooling(1)));
        assert!(matches!(timer.tick_at(now()), Some(TickResult::Finished(_))));
    }

    #[test]
    fn test_full_run_tick_count() {
        let tables = DurationTables::default();
        let mut timer = PhaseTimer::new();
        timer
            .start(&tables, SessionSettings::new("Quartz", "Flat Top", "Shatter", 1.0))
            .unwrap();

        let mut ticks = 0;
        loop {
            ticks += 1;
            if let Some(TickResult::Finished(_)) = timer.tick_at(now()) {
                break;
            }
        }
        assert_eq!(ticks, 30 + 45);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let tables = tables_with(5, 5);
        let mut timer = PhaseTimer::new();
        timer.start(&tables, test_settings()).unwrap();
        timer.tick_at(now());

        let other = SessionSettings::new("Quartz", "Thermal", "Sugar", 2.0);
        let err = timer.start(&tables, other).unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning));

        assert_eq!(timer.phase(), Phase::Heating);
        assert_eq!(timer.remaining_seconds(), 4);
        assert_eq!(timer.heat_seconds(), Some(5));
        assert_eq!(timer.settings().unwrap().material, "Test");
    }

    #[test]
    fn test_start_with_unknown_category_leaves_idle() {
        let tables = DurationTables::default();
        let mut timer = PhaseTimer::new();

        let err = timer
            .start(&tables, SessionSettings::new("Glass", "Flat Top", "Shatter", 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCategory { .. }));
        assert!(!timer.is_running());
        assert_eq!(timer.display(), "Ready");
    }

    #[test]
    fn test_stop_mid_heat_discards_run() {
        let tables = tables_with(3, 2);
        let mut timer = PhaseTimer::new();
        timer.start(&tables, test_settings()).unwrap();
        timer.tick_at(now());

        timer.stop();
        assert_eq!(timer.phase(), Phase::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
        assert_eq!(timer.heat_seconds(), None);
        assert_eq!(timer.display(), "Stopped");
        assert_eq!(timer.tick_at(now()), None);

        // A fresh run can start right away
        timer.start(&tables, test_settings()).unwrap();
        assert_eq!(timer.display(), "Heating: 3s");
    }

    #[test]
    fn test_stop_mid_cool() {
        let tables = tables_with(1, 3);
        let mut timer = PhaseTimer::new();
        timer.start(&tables, test_settings()).unwrap();
        assert_eq!(timer.tick_at(now()), Some(cooling(3)));

        timer.stop();
        assert!(!timer.is_running());
    }

    #[test]
    fn test_zero_cool_time_costs_one_tick() {
        let mut tables = tables_with(1, 1);
        tables.style_modifiers.insert("Tiny".into(), 0.01);
        let mut timer = PhaseTimer::new();
        timer
            .start(&tables, SessionSettings::new("Test", "Tiny", "Test", 1.0))
            .unwrap();

        assert_eq!(timer.tick_at(now()), Some(cooling(0)));
        assert!(matches!(timer.tick_at(now()), Some(TickResult::Finished(_))));
    }

    #[test]
    fn test_tick_result_display() {
        assert_eq!(heating(29).display(), "Heating: 29s");
        assert_eq!(cooling(3).display(), "Cooling: 3s");
    }
}
