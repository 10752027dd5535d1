use anyhow::{anyhow, Result};

pub const DEFAULT_LEFT_COMMAND: &str = "KIRI";
pub const DEFAULT_RIGHT_COMMAND: &str = "KANAN";

/// Screen-position override for navigation.
///
/// A center strictly left of `left_barrier` maps to the left command, strictly
/// right of `right_barrier` to the right command. Centers on a barrier fall in
/// the middle zone.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneMapper {
    left_barrier: f32,
    right_barrier: f32,
    left_command: String,
    right_command: String,
}

/// Where a center falls relative to the barriers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    Left,
    Middle,
    Right,
}

impl ZoneMapper {
    pub fn new(left_barrier: f32, right_barrier: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&left_barrier) || !(0.0..=1.0).contains(&right_barrier) {
            return Err(anyhow!(
                "barriers must lie in 0..1 (left={}, right={})",
                left_barrier,
                right_barrier
            ));
        }
        if left_barrier >= right_barrier {
            return Err(anyhow!(
                "left barrier {} must be less than right barrier {}",
                left_barrier,
                right_barrier
            ));
        }
        Ok(Self {
            left_barrier,
            right_barrier,
            left_command: DEFAULT_LEFT_COMMAND.to_string(),
            right_command: DEFAULT_RIGHT_COMMAND.to_string(),
        })
    }

    pub fn with_commands(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_command = left.into();
        self.right_command = right.into();
        self
    }

    pub fn zone(&self, center_x: f32) -> Zone {
        if center_x < self.left_barrier {
            Zone::Left
        } else if center_x > self.right_barrier {
            Zone::Right
        } else {
            Zone::Middle
        }
    }

    /// Substitute a directional command, or pass `label` through in the middle zone.
    pub fn map(&self, center_x: f32, label: Option<String>) -> Option<String> {
        match self.zone(center_x) {
            Zone::Left => Some(self.left_command.clone()),
            Zone::Right => Some(self.right_command.clone()),
            Zone::Middle => label,
        }
    }

    pub fn left_command(&self) -> &str {
        &self.left_command
    }

    pub fn right_command(&self) -> &str {
        &self.right_command
    }
}
