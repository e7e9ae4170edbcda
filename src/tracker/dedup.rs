//! Suppression of repeated transition reports.
//!
//! The classifier tends to re-send the same transition in bursts. A single
//! report identical to the last accepted one inside the suppression window is
//! dropped. Batches of two or more are trusted as platform-paired signals and
//! always pass.

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::TransitionEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const DEFAULT_SUPPRESSION_WINDOW_SECS: i64 = 10 * 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Hand these to the tracker, in order.
    Forward(Vec<TransitionEvent>),
    /// Repeat of the last accepted event inside the window.
    Suppressed(TransitionEvent),
    /// Nothing usable in the batch.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct TransitionDeduplicator {
    window: TimeDelta,
    last_accepted: Option<TransitionEvent>,
    last_accepted_at: Option<DateTime<Utc>>,
}

impl Default for TransitionDeduplicator {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(DEFAULT_SUPPRESSION_WINDOW_SECS))
    }
}

impl TransitionDeduplicator {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            window,
            last_accepted: None,
            last_accepted_at: None,
        }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn last_accepted(&self) -> Option<&TransitionEvent> {
        self.last_accepted.as_ref()
    }

    /// Decides what to do with a batch that arrived at `now`.
    pub fn filter(&mut self, batch: &[TransitionEvent], now: DateTime<Utc>) -> Verdict {
        if batch.is_empty() {
            log_warn!("No activity transition events found in batch");
            return Verdict::Ignored;
        }

        let usable: Vec<TransitionEvent> =
            batch.iter().filter(|e| !e.is_malformed()).copied().collect();
        if usable.len() < batch.len() {
            log_warn!(
                "Dropped {} malformed transition event(s) from batch of {}",
                batch.len() - usable.len(),
                batch.len()
            );
        }

        let last = match usable.last() {
            Some(last) => *last,
            None => return Verdict::Ignored,
        };

        if usable.len() == 1 && self.is_repeat(&last, now) {
            log_debug!("Suppressed repeated transition {}", last.describe());
            return Verdict::Suppressed(last);
        }

        self.last_accepted = Some(last);
        self.last_accepted_at = Some(now);
        Verdict::Forward(usable)
    }

    fn is_repeat(&self, event: &TransitionEvent, now: DateTime<Utc>) -> bool {
        let (Some(previous), Some(accepted_at)) = (&self.last_accepted, self.last_accepted_at)
        else {
            return false;
        };
        if !previous.same_kind(event) {
            return false;
        }
        // a clock that went backwards never suppresses
        let elapsed = now - accepted_at;
        elapsed >= TimeDelta::zero() && elapsed < self.window
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{ActivityKind, TransitionKind};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 12, 9, 0, 0).unwrap()
    }

    fn ev(activity: ActivityKind, transition: TransitionKind) -> TransitionEvent {
        TransitionEvent::new(activity, transition, t0())
    }

    fn walking_enter() -> TransitionEvent {
        ev(ActivityKind::Walking, TransitionKind::Enter)
    }

    #[test]
    fn first_event_is_forwarded() {
        let mut dedup = TransitionDeduplicator::default();
        assert_eq!(
            dedup.filter(&[walking_enter()], t0()),
            Verdict::Forward(vec![walking_enter()])
        );
        assert_eq!(dedup.last_accepted(), Some(&walking_enter()));
    }

    #[test]
    fn repeat_inside_window_is_suppressed_then_reopens() {
        let mut dedup = TransitionDeduplicator::default();
        dedup.filter(&[walking_enter()], t0());

        let inside = t0() + TimeDelta::minutes(9);
        assert_eq!(
            dedup.filter(&[walking_enter()], inside),
            Verdict::Suppressed(walking_enter())
        );

        // window counts from the last *accepted* event, not the suppressed one
        let after = t0() + TimeDelta::minutes(10);
        assert!(matches!(
            dedup.filter(&[walking_enter()], after),
            Verdict::Forward(_)
        ));
    }

    #[test]
    fn different_transition_or_activity_passes() {
        let mut dedup = TransitionDeduplicator::default();
        dedup.filter(&[walking_enter()], t0());

        let soon = t0() + TimeDelta::seconds(5);
        assert!(matches!(
            dedup.filter(&[ev(ActivityKind::Walking, TransitionKind::Exit)], soon),
            Verdict::Forward(_)
        ));
        assert!(matches!(
            dedup.filter(&[walking_enter()], soon),
            Verdict::Forward(_)
        ));
        assert!(matches!(
            dedup.filter(&[ev(ActivityKind::Running, TransitionKind::Enter)], soon),
            Verdict::Forward(_)
        ));
    }

    #[test]
    fn pairs_bypass_suppression_and_become_the_reference() {
        let mut dedup = TransitionDeduplicator::default();
        dedup.filter(&[walking_enter()], t0());

        let pair = [ev(ActivityKind::Walking, TransitionKind::Exit), walking_enter()];
        let soon = t0() + TimeDelta::seconds(1);
        assert_eq!(dedup.filter(&pair, soon), Verdict::Forward(pair.to_vec()));
        assert_eq!(dedup.filter(&pair, soon), Verdict::Forward(pair.to_vec()));

        assert!(matches!(
            dedup.filter(&[walking_enter()], soon),
            Verdict::Suppressed(_)
        ));
    }

    #[test]
    fn empty_and_malformed_batches_are_ignored() {
        let mut dedup = TransitionDeduplicator::default();
        assert_eq!(dedup.filter(&[], t0()), Verdict::Ignored);

        let junk = [
            ev(ActivityKind::Unknown, TransitionKind::Enter),
            ev(ActivityKind::Walking, TransitionKind::Unknown),
        ];
        assert_eq!(dedup.filter(&junk, t0()), Verdict::Ignored);
        assert!(dedup.last_accepted().is_none());
    }

    #[test]
    fn malformed_half_of_a_pair_is_stripped() {
        let mut dedup = TransitionDeduplicator::default();
        let batch = [ev(ActivityKind::Unknown, TransitionKind::Exit), walking_enter()];
        assert_eq!(
            dedup.filter(&batch, t0()),
            Verdict::Forward(vec![walking_enter()])
        );
    }

    #[test]
    fn pair_with_malformed_half_counts_as_single_report() {
        let mut dedup = TransitionDeduplicator::default();
        dedup.filter(&[walking_enter()], t0());

        // only one usable event is left, so the window applies to it
        let batch = [ev(ActivityKind::Walking, TransitionKind::Unknown), walking_enter()];
        let soon = t0() + TimeDelta::seconds(20);
        assert_eq!(
            dedup.filter(&batch, soon),
            Verdict::Suppressed(walking_enter())
        );
    }

    #[test]
    fn clock_going_backwards_does_not_suppress() {
        let mut dedup = TransitionDeduplicator::default();
        dedup.filter(&[walking_enter()], t0());
        let earlier = t0() - TimeDelta::seconds(30);
        assert!(matches!(
            dedup.filter(&[walking_enter()], earlier),
            Verdict::Forward(_)
        ));
    }
}
