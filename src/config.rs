use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DecoderSettings;
use crate::labels::LabelTable;
use crate::recognize::{TrajectorySettings, DEFAULT_LEFT_COMMAND, DEFAULT_RIGHT_COMMAND};
use crate::temporal::{AbsentPolicy, DEFAULT_GRACE_PERIOD, DEFAULT_HOLD_TIME};

const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 320;
const DEFAULT_FLIP_X: bool = true;
const DEFAULT_TARGET_HZ: u32 = 15;
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);
const DEFAULT_SMOOTHING_LENGTH: usize = 8;
const DEFAULT_LEFT_BARRIER: f32 = 0.35;
const DEFAULT_RIGHT_BARRIER: f32 = 0.65;
const DEFAULT_MOTION_SYMBOL: &str = "J";
const DEFAULT_COMPOSITE_SYMBOL: &str = "G";
const MAX_TARGET_HZ: u32 = 60;

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    detection: Option<DetectionConfigFile>,
    schedule: Option<ScheduleConfigFile>,
    smoothing: Option<SmoothingConfigFile>,
    confirm: Option<ConfirmConfigFile>,
    trajectory: Option<TrajectoryConfigFile>,
    zone: Option<ZoneConfigFile>,
    labels: Option<LabelsConfigFile>,
    model: Option<ModelConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
    flip_x: Option<bool>,
    num_classes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleConfigFile {
    target_hz: Option<u32>,
    cooldown_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SmoothingConfigFile {
    length: Option<usize>,
    absent_policy: Option<AbsentPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfirmConfigFile {
    hold_secs: Option<f64>,
    grace_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrajectoryConfigFile {
    length: Option<usize>,
    min_samples: Option<usize>,
    drop_threshold: Option<f32>,
    curve_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ZoneConfigFile {
    left_barrier: Option<f32>,
    right_barrier: Option<f32>,
    left_command: Option<String>,
    right_command: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelsConfigFile {
    path: Option<PathBuf>,
    motion: Option<Vec<String>>,
    composite: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub detection: DetectionSettings,
    pub schedule: ScheduleSettings,
    pub smoothing: SmoothingSettings,
    pub confirm: ConfirmSettings,
    pub trajectory: TrajectorySettings,
    pub zone: ZoneSettings,
    pub labels: LabelSettings,
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
    pub flip_x: bool,
    /// Class count assumed when no label table is loaded. `None` means the
    /// detection context's own model default.
    pub num_classes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub target_hz: u32,
    pub cooldown: Duration,
}

impl ScheduleSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_hz.max(1) as f64)
    }

    /// Timestamp offset of the `index`-th frame at this rate.
    pub fn frame_offset(&self, index: usize) -> Result<Duration> {
        let index = u32::try_from(index)
            .map_err(|_| anyhow!("frame index {} exceeds the supported range", index))?;
        self.interval()
            .checked_mul(index)
            .ok_or_else(|| anyhow!("frame {} offset overflows", index))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingSettings {
    pub length: usize,
    /// Overrides the per-context default when set.
    pub absent_policy: Option<AbsentPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmSettings {
    pub hold_time: Duration,
    pub grace: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSettings {
    pub left_barrier: f32,
    pub right_barrier: f32,
    pub left_command: String,
    pub right_command: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelSettings {
    pub path: Option<PathBuf>,
    pub motion: Vec<String>,
    pub composite: Vec<String>,
}

impl EngineConfig {
    /// Load from the file named by `HANDSIGN_CONFIG` (if any), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HANDSIGN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EngineConfigFile) -> Result<Self> {
        let detection = file.detection.unwrap_or_default();
        let schedule = file.schedule.unwrap_or_default();
        let smoothing = file.smoothing.unwrap_or_default();
        let confirm = file.confirm.unwrap_or_default();
        let trajectory = file.trajectory.unwrap_or_default();
        let zone = file.zone.unwrap_or_default();
        let labels = file.labels.unwrap_or_default();
        let trajectory_defaults = TrajectorySettings::default();

        Ok(Self {
            detection: DetectionSettings {
                confidence_threshold: detection.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE),
                iou_threshold: detection.iou_threshold.unwrap_or(DEFAULT_IOU),
                input_size: detection.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                flip_x: detection.flip_x.unwrap_or(DEFAULT_FLIP_X),
                num_classes: detection.num_classes,
            },
            schedule: ScheduleSettings {
                target_hz: schedule.target_hz.unwrap_or(DEFAULT_TARGET_HZ),
                cooldown: secs("schedule.cooldown_secs", schedule.cooldown_secs)?
                    .unwrap_or(DEFAULT_COOLDOWN),
            },
            smoothing: SmoothingSettings {
                length: smoothing.length.unwrap_or(DEFAULT_SMOOTHING_LENGTH),
                absent_policy: smoothing.absent_policy,
            },
            confirm: ConfirmSettings {
                hold_time: secs("confirm.hold_secs", confirm.hold_secs)?
                    .unwrap_or(DEFAULT_HOLD_TIME),
                grace: secs("confirm.grace_secs", confirm.grace_secs)?
                    .unwrap_or(DEFAULT_GRACE_PERIOD),
            },
            trajectory: TrajectorySettings {
                length: trajectory.length.unwrap_or(trajectory_defaults.length),
                min_samples: trajectory
                    .min_samples
                    .unwrap_or(trajectory_defaults.min_samples),
                drop_threshold: trajectory
                    .drop_threshold
                    .unwrap_or(trajectory_defaults.drop_threshold),
                curve_threshold: trajectory
                    .curve_threshold
                    .unwrap_or(trajectory_defaults.curve_threshold),
            },
            zone: ZoneSettings {
                left_barrier: zone.left_barrier.unwrap_or(DEFAULT_LEFT_BARRIER),
                right_barrier: zone.right_barrier.unwrap_or(DEFAULT_RIGHT_BARRIER),
                left_command: zone
                    .left_command
                    .unwrap_or_else(|| DEFAULT_LEFT_COMMAND.to_string()),
                right_command: zone
                    .right_command
                    .unwrap_or_else(|| DEFAULT_RIGHT_COMMAND.to_string()),
            },
            labels: LabelSettings {
                path: labels.path,
                motion: labels
                    .motion
                    .unwrap_or_else(|| vec![DEFAULT_MOTION_SYMBOL.to_string()]),
                composite: labels
                    .composite
                    .unwrap_or_else(|| vec![DEFAULT_COMPOSITE_SYMBOL.to_string()]),
            },
            model_path: file.model.and_then(|model| model.path),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("HANDSIGN_CONFIDENCE") {
            self.detection.confidence_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("HANDSIGN_CONFIDENCE must be a number"))?;
        }
        if let Ok(value) = std::env::var("HANDSIGN_IOU") {
            self.detection.iou_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("HANDSIGN_IOU must be a number"))?;
        }
        if let Ok(value) = std::env::var("HANDSIGN_TARGET_HZ") {
            self.schedule.target_hz = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("HANDSIGN_TARGET_HZ must be an integer"))?;
        }
        if let Ok(value) = std::env::var("HANDSIGN_FLIP_X") {
            self.detection.flip_x = parse_bool(&value)
                .ok_or_else(|| anyhow!("HANDSIGN_FLIP_X must be true/false/1/0"))?;
        }
        if let Ok(path) = std::env::var("HANDSIGN_LABELS") {
            if !path.trim().is_empty() {
                self.labels.path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("HANDSIGN_MODEL") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.detection.confidence_threshold),
            ("iou_threshold", self.detection.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must lie in 0..1, got {}", name, value));
            }
        }
        if self.detection.input_size == 0 {
            return Err(anyhow!("input_size must be greater than zero"));
        }
        if self.detection.num_classes == Some(0) {
            return Err(anyhow!("num_classes must be greater than zero"));
        }
        if self.schedule.target_hz == 0 || self.schedule.target_hz > MAX_TARGET_HZ {
            return Err(anyhow!(
                "target_hz must be between 1 and {}, got {}",
                MAX_TARGET_HZ,
                self.schedule.target_hz
            ));
        }
        if self.smoothing.length == 0 {
            return Err(anyhow!("smoothing length must be greater than zero"));
        }
        if self.trajectory.length == 0 {
            return Err(anyhow!("trajectory length must be greater than zero"));
        }
        if self.trajectory.min_samples > self.trajectory.length {
            return Err(anyhow!(
                "trajectory min_samples ({}) exceeds trajectory length ({})",
                self.trajectory.min_samples,
                self.trajectory.length
            ));
        }
        let zone = &self.zone;
        if !(0.0..=1.0).contains(&zone.left_barrier)
            || !(0.0..=1.0).contains(&zone.right_barrier)
            || zone.left_barrier >= zone.right_barrier
        {
            return Err(anyhow!(
                "barriers must satisfy 0 <= left < right <= 1 (left={}, right={})",
                zone.left_barrier,
                zone.right_barrier
            ));
        }
        Ok(())
    }

    /// Load the configured label table, or an empty one when no path is set.
    pub fn label_table(&self) -> Result<LabelTable> {
        let Some(path) = &self.labels.path else {
            return Ok(LabelTable::default());
        };
        Ok(LabelTable::load(path)?
            .with_motion(self.labels.motion.as_slice())
            .with_composite(self.labels.composite.as_slice()))
    }

    /// Decoder settings. The class count follows the label table when one is
    /// loaded, then the configured `num_classes`, then `model_classes`.
    pub fn decoder_settings(&self, labels: &LabelTable, model_classes: usize) -> DecoderSettings {
        DecoderSettings {
            num_classes: if labels.is_empty() {
                self.detection.num_classes.unwrap_or(model_classes)
            } else {
                labels.len()
            },
            input_size: self.detection.input_size,
            confidence_threshold: self.detection.confidence_threshold,
            flip_x: self.detection.flip_x,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let trajectory = TrajectorySettings::default();
        Self {
            detection: DetectionSettings {
                confidence_threshold: DEFAULT_CONFIDENCE,
                iou_threshold: DEFAULT_IOU,
                input_size: DEFAULT_INPUT_SIZE,
                flip_x: DEFAULT_FLIP_X,
                num_classes: None,
            },
            schedule: ScheduleSettings {
                target_hz: DEFAULT_TARGET_HZ,
                cooldown: DEFAULT_COOLDOWN,
            },
            smoothing: SmoothingSettings {
                length: DEFAULT_SMOOTHING_LENGTH,
                absent_policy: None,
            },
            confirm: ConfirmSettings {
                hold_time: DEFAULT_HOLD_TIME,
                grace: DEFAULT_GRACE_PERIOD,
            },
            trajectory,
            zone: ZoneSettings {
                left_barrier: DEFAULT_LEFT_BARRIER,
                right_barrier: DEFAULT_RIGHT_BARRIER,
                left_command: DEFAULT_LEFT_COMMAND.to_string(),
                right_command: DEFAULT_RIGHT_COMMAND.to_string(),
            },
            labels: LabelSettings {
                path: None,
                motion: vec![DEFAULT_MOTION_SYMBOL.to_string()],
                composite: vec![DEFAULT_COMPOSITE_SYMBOL.to_string()],
            },
            model_path: None,
        }
    }
}

fn read_config_file(path: &Path) -> Result<EngineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn secs(name: &str, value: Option<f64>) -> Result<Option<Duration>> {
    value
        .map(|v| {
            Duration::try_from_secs_f64(v)
                .map_err(|_| anyhow!("{} must be a non-negative number of seconds, got {}", name, v))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
