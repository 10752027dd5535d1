use std::collections::{HashMap, VecDeque};

use serde::Deserialize;

/// What the smoother does with frames that produced no label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentPolicy {
    /// Absent frames occupy buffer slots and dilute the majority, so a symbol
    /// fades out after a few empty frames.
    Count,
    /// Absent frames are not buffered; the vote covers only the most recent
    /// labelled frames, so the last symbol survives detection gaps.
    Skip,
}

/// Majority-vote filter over recent raw labels.
///
/// A label is emitted only with a strict majority of the current buffer
/// length, which rejects single-frame misclassifications.
#[derive(Clone, Debug)]
pub struct TemporalSmoother {
    capacity: usize,
    policy: AbsentPolicy,
    buffer: VecDeque<Option<String>>,
}

impl TemporalSmoother {
    pub fn new(capacity: usize, policy: AbsentPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            policy,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn policy(&self) -> AbsentPolicy {
        self.policy
    }

    /// Push this frame's raw label and return the stable label.
    pub fn push(&mut self, label: Option<&str>) -> Option<String> {
        match (label, self.policy) {
            (None, AbsentPolicy::Skip) => {}
            _ => {
                self.buffer.push_back(label.map(str::to_string));
                while self.buffer.len() > self.capacity {
                    self.buffer.pop_front();
                }
            }
        }
        self.stable()
    }

    /// Current majority winner without pushing.
    pub fn stable(&self) -> Option<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut best: Option<(&str, usize)> = None;
        for label in self.buffer.iter().flatten() {
            let count = counts.entry(label.as_str()).or_insert(0);
            *count += 1;
            if best.map_or(true, |(_, max)| *count > max) {
                best = Some((label.as_str(), *count));
            }
        }

        let (label, count) = best?;
        if count * 2 > self.buffer.len() {
            Some(label.to_string())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
