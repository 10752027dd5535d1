use std::time::{Duration, Instant};

pub const DEFAULT_HOLD_TIME: Duration = Duration::from_millis(300);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Debouncer phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmPhase {
    Idle,
    Accumulating,
    Confirmed,
}

/// Snapshot of the debouncer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfirmationState {
    pub last_raw_word: Option<String>,
    pub hold_start: Option<Instant>,
    pub confirmed_word: Option<String>,
    pub last_confirmed: Option<String>,
}

/// Edge-triggered hold-to-confirm debounce.
///
/// A word must stay unchanged for `hold_time` before it is confirmed, and it is
/// reported exactly once per hold. Absent input is tolerated for `grace`
/// before the state clears; the cleared confirmation is kept as
/// `last_confirmed`.
#[derive(Clone, Debug)]
pub struct HoldToConfirm {
    hold_time: Duration,
    grace: Duration,
    uppercase: bool,
    state: ConfirmationState,
    absent_since: Option<Instant>,
}

impl HoldToConfirm {
    pub fn new(hold_time: Duration, grace: Duration) -> Self {
        Self {
            hold_time,
            grace,
            uppercase: false,
            state: ConfirmationState::default(),
            absent_since: None,
        }
    }

    /// Normalize words to uppercase before comparing.
    pub fn uppercase(mut self, enabled: bool) -> Self {
        self.uppercase = enabled;
        self
    }

    /// Feed the stable word for this frame. Returns the word on the frame it
    /// becomes confirmed, `None` otherwise.
    pub fn observe(&mut self, word: Option<&str>, now: Instant) -> Option<String> {
        let Some(word) = word.filter(|w| !w.is_empty()) else {
            self.observe_absent(now);
            return None;
        };
        self.absent_since = None;

        let word = if self.uppercase {
            word.to_uppercase()
        } else {
            word.to_string()
        };

        if self.state.last_raw_word.as_deref() != Some(word.as_str()) {
            self.retire_confirmed();
            self.state.last_raw_word = Some(word.clone());
            self.state.hold_start = Some(now);
        }

        if self.state.confirmed_word.is_some() {
            return None;
        }
        let held = self
            .state
            .hold_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        if held >= self.hold_time {
            log::info!("confirmed keyword '{}' after {:?}", word, held);
            self.state.confirmed_word = Some(word.clone());
            return Some(word);
        }
        None
    }

    fn observe_absent(&mut self, now: Instant) {
        if self.state.last_raw_word.is_none() {
            return;
        }
        let since = *self.absent_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.grace {
            log::debug!(
                "input absent for {:?}, clearing '{}'",
                self.grace,
                self.state.last_raw_word.as_deref().unwrap_or_default()
            );
            self.retire_confirmed();
            self.state.last_raw_word = None;
            self.state.hold_start = None;
            self.absent_since = None;
        }
    }

    fn retire_confirmed(&mut self) {
        if let Some(word) = self.state.confirmed_word.take() {
            self.state.last_confirmed = Some(word);
        }
    }

    pub fn phase(&self) -> ConfirmPhase {
        if self.state.confirmed_word.is_some() {
            ConfirmPhase::Confirmed
        } else if self.state.last_raw_word.is_some() {
            ConfirmPhase::Accumulating
        } else {
            ConfirmPhase::Idle
        }
    }

    pub fn confirmed(&self) -> Option<&str> {
        self.state.confirmed_word.as_deref()
    }

    pub fn last_confirmed(&self) -> Option<&str> {
        self.state.last_confirmed.as_deref()
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    /// Forget everything, including the last confirmed word.
    pub fn reset(&mut self) {
        self.state = ConfirmationState::default();
        self.absent_since = None;
    }
}

impl Default for HoldToConfirm {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_TIME, DEFAULT_GRACE_PERIOD)
    }
}
