//! Window scheduling state machine
//!
//! ```text
//! WARMUP ──emit warm-up──▶ STEPPING ──end > last data day──▶ DONE
//!                            │  ▲
//!                            └──┘ advance end by cadence
//! ```
//!
//! The warm-up window always spans `[data_start, warmup_end)`. Stepping
//! windows end every `cadence` days after the warm-up end and start at
//! `max(end - lookback, warmup_end)`, so no stepping window reaches back into
//! the warm-up period.

use crate::types::Window;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Warmup,
    Stepping,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Warmup => write!(f, "warmup"),
            Phase::Stepping => write!(f, "stepping"),
        }
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Warmup,
    Stepping { last_end: NaiveDate },
    Done,
}

/// One emitted window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledWindow {
    /// 0 for the warm-up window, k for the k-th stepping window
    pub index: usize,
    pub phase: Phase,
    pub window: Window,
}

#[derive(Debug, Clone)]
pub struct WindowScheduler {
    data_start: NaiveDate,
    data_end: NaiveDate,
    warmup_end: NaiveDate,
    cadence: Duration,
    lookback: Duration,
    state: ScheduleState,
    next_index: usize,
}

impl WindowScheduler {
    /// `data_end` is the last day that carries events
    pub fn new(
        data_start: NaiveDate,
        data_end: NaiveDate,
        warmup_days: i64,
        cadence_days: i64,
        lookback_days: i64,
    ) -> Self {
        Self {
            data_start,
            data_end,
            warmup_end: data_start + Duration::days(warmup_days),
            cadence: Duration::days(cadence_days),
            lookback: Duration::days(lookback_days),
            state: ScheduleState::Warmup,
            next_index: 0,
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn warmup_end(&self) -> NaiveDate {
        self.warmup_end
    }

    /// Whether `day` is the end of a window on this schedule
    pub fn is_on_grid(&self, day: NaiveDate) -> bool {
        if day == self.warmup_end {
            return true;
        }
        day > self.warmup_end
            && (day - self.warmup_end).num_days() % self.cadence.num_days() == 0
    }

    /// Skip every window ending at or before `day`
    ///
    /// Used when resuming from a checkpoint keyed by `day`. An off-grid day
    /// (the cadence or warm-up changed since it was written) is kept as the
    /// new origin: later windows end every `cadence` days after it.
    pub fn resume_after(&mut self, day: NaiveDate) {
        if day < self.warmup_end {
            return;
        }
        if !self.is_on_grid(day) {
            warn!(
                "Checkpoint {} is not a window end of the current schedule (warm-up end {}, cadence {} days); stepping continues from it",
                day,
                self.warmup_end,
                self.cadence.num_days()
            );
        }
        let steps = (day - self.warmup_end).num_days() / self.cadence.num_days();
        self.next_index = steps as usize + 1;
        self.state = if day + self.cadence > self.data_end {
            ScheduleState::Done
        } else {
            ScheduleState::Stepping { last_end: day }
        };
    }

    fn stepping_window(&self, end: NaiveDate) -> Window {
        let start = std::cmp::max(end - self.lookback, self.warmup_end);
        Window::new(start, end)
    }
}

impl Iterator for WindowScheduler {
    type Item = ScheduledWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let (phase, window) = match self.state {
            ScheduleState::Done => return None,
            ScheduleState::Warmup => (
                Phase::Warmup,
                Window::new(self.data_start, self.warmup_end),
            ),
            ScheduleState::Stepping { last_end } => {
                let end = last_end + self.cadence;
                if end > self.data_end {
                    self.state = ScheduleState::Done;
                    return None;
                }
                (Phase::Stepping, self.stepping_window(end))
            }
        };

        self.state = ScheduleState::Stepping {
            last_end: window.end,
        };
        let index = self.next_index;
        self.next_index += 1;

        Some(ScheduledWindow {
            index,
            phase,
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(n)
    }

    fn offset(d: NaiveDate) -> i64 {
        (d - day(0)).num_days()
    }

    #[test]
    fn test_thirty_seven_ninety_schedule() {
        let windows: Vec<_> = WindowScheduler::new(day(0), day(100), 30, 7, 90).collect();

        let ends: Vec<i64> = windows.iter().map(|w| offset(w.window.end)).collect();
        let expected: Vec<i64> = (0..=10).map(|k| 30 + 7 * k).collect();
        assert_eq!(ends, expected);

        assert_eq!(windows[0].phase, Phase::Warmup);
        assert_eq!(offset(windows[0].window.start), 0);
        assert_eq!(windows[1].phase, Phase::Stepping);
        assert_eq!(offset(windows[1].window.start), 30);
        assert_eq!(windows[10].index, 10);
    }

    #[test]
    fn test_lookback_clamps_at_warmup_end() {
        let windows: Vec<_> = WindowScheduler::new(day(0), day(100), 30, 7, 20).collect();

        for w in &windows[1..] {
            assert!(w.window.start >= day(30));
            assert!(w.window.len_days() <= 20);
        }
        // end 65 → start 45
        let w = windows.iter().find(|w| offset(w.window.end) == 65).unwrap();
        assert_eq!(offset(w.window.start), 45);
    }

    #[test]
    fn test_ends_strictly_increase_and_stop_after_data() {
        let mut scheduler = WindowScheduler::new(day(0), day(50), 30, 7, 90);
        let ends: Vec<_> = scheduler.by_ref().map(|w| w.window.end).collect();

        assert!(ends.windows(2).all(|p| p[0] < p[1]));
        assert!(ends.iter().all(|e| *e <= day(50)));
        assert_eq!(scheduler.state(), ScheduleState::Done);
        assert!(scheduler.next().is_none());
    }

    #[test]
    fn test_short_history_emits_only_warmup() {
        let windows: Vec<_> = WindowScheduler::new(day(0), day(10), 30, 7, 90).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].phase, Phase::Warmup);
    }

    #[test]
    fn test_resume_after_checkpoint() {
        let mut scheduler = WindowScheduler::new(day(0), day(100), 30, 7, 90);
        scheduler.resume_after(day(44));

        let next = scheduler.next().unwrap();
        assert_eq!(next.phase, Phase::Stepping);
        assert_eq!(offset(next.window.end), 51);
        assert_eq!(next.index, 3);
    }

    #[test]
    fn test_resume_from_off_grid_checkpoint() {
        let mut scheduler = WindowScheduler::new(day(0), day(100), 30, 7, 90);
        assert!(scheduler.is_on_grid(day(30)));
        assert!(scheduler.is_on_grid(day(44)));
        assert!(!scheduler.is_on_grid(day(40)));
        assert!(!scheduler.is_on_grid(day(23)));

        // Written by a run with a 5-day cadence
        scheduler.resume_after(day(40));
        let ends: Vec<i64> = scheduler.map(|w| offset(w.window.end)).collect();
        assert_eq!(ends.first(), Some(&47));
        assert!(ends.windows(2).all(|p| p[1] - p[0] == 7));
    }

    #[test]
    fn test_resume_after_last_window_is_done() {
        let mut scheduler = WindowScheduler::new(day(0), day(100), 30, 7, 90);
        scheduler.resume_after(day(100));
        assert_eq!(scheduler.state(), ScheduleState::Done);
        assert!(scheduler.next().is_none());
    }
}
