use crate::error::ConfigError;
use sdt_core::Key;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Discrete ISI candidate set `{lower, lower+step, ..., <= upper}` in ms.
/// Only constructible through [`IsiRange::new`], so a value always has a
/// non-zero step and `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IsiRangeFields")]
pub struct IsiRange {
    lower_ms: u64,
    upper_ms: u64,
    step_ms: u64,
}

#[derive(Deserialize)]
struct IsiRangeFields {
    lower_ms: u64,
    upper_ms: u64,
    step_ms: u64,
}

impl TryFrom<IsiRangeFields> for IsiRange {
    type Error = ConfigError;

    fn try_from(f: IsiRangeFields) -> Result<Self, Self::Error> {
        Self::new(f.lower_ms, f.upper_ms, f.step_ms)
    }
}

impl IsiRange {
    pub fn new(lower_ms: u64, upper_ms: u64, step_ms: u64) -> Result<Self, ConfigError> {
        if step_ms == 0 || lower_ms > upper_ms {
            return Err(ConfigError::InvalidIsiRange {
                lower: lower_ms,
                upper: upper_ms,
                step: step_ms,
            });
        }
        Ok(Self {
            lower_ms,
            upper_ms,
            step_ms,
        })
    }

    pub fn lower_ms(&self) -> u64 {
        self.lower_ms
    }

    pub fn upper_ms(&self) -> u64 {
        self.upper_ms
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// Largest candidate, i.e. `upper` rounded down onto the step grid.
    pub fn max_reachable(&self) -> u64 {
        self.lower_ms + (self.upper_ms - self.lower_ms) / self.step_ms * self.step_ms
    }

    pub fn candidates(&self) -> Vec<u64> {
        // A step wider than the address space leaves `lower` as the only candidate.
        let step = usize::try_from(self.step_ms).unwrap_or(usize::MAX);
        (self.lower_ms..=self.upper_ms).step_by(step).collect()
    }
}

/// Named ISI presets, chosen once at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsiProfile {
    /// Short intervals for walking through a session quickly.
    Debug,
    #[default]
    Session,
}

impl IsiProfile {
    pub fn range(&self) -> IsiRange {
        match self {
            IsiProfile::Debug => IsiRange {
                lower_ms: 10,
                upper_ms: 20,
                step_ms: 1,
            },
            IsiProfile::Session => IsiRange {
                lower_ms: 2500,
                upper_ms: 3500,
                step_ms: 250,
            },
        }
    }
}

impl FromStr for IsiProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(IsiProfile::Debug),
            "session" => Ok(IsiProfile::Session),
            other => Err(ConfigError::Invalid(format!("unknown ISI profile {other:?}"))),
        }
    }
}

/// Locations of the session materials. Relative paths are resolved against
/// the directory of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "PathsConfig::default_instructions")]
    pub instructions: PathBuf,
    #[serde(default = "PathsConfig::default_word_lists")]
    pub word_lists: PathBuf,
    #[serde(default = "PathsConfig::default_tape")]
    pub tape: PathBuf,
    #[serde(default = "PathsConfig::default_track_orders")]
    pub track_orders: PathBuf,
    #[serde(default = "PathsConfig::default_list_orders")]
    pub list_orders: PathBuf,
    #[serde(default = "PathsConfig::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub font: Option<PathBuf>,
}

impl PathsConfig {
    fn default_instructions() -> PathBuf {
        "instructions.json".into()
    }
    fn default_word_lists() -> PathBuf {
        "sdt_word_lists.csv".into()
    }
    fn default_tape() -> PathBuf {
        "tape.json".into()
    }
    fn default_track_orders() -> PathBuf {
        "integer_2_noise_order.json".into()
    }
    fn default_list_orders() -> PathBuf {
        "letter_2_word_list_order.json".into()
    }
    fn default_data_dir() -> PathBuf {
        "data".into()
    }

    fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.instructions,
            &mut self.word_lists,
            &mut self.tape,
            &mut self.track_orders,
            &mut self.list_orders,
            &mut self.data_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(font) = self.font.as_mut().filter(|f| f.is_relative()) {
            *font = base.join(&*font);
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            instructions: Self::default_instructions(),
            word_lists: Self::default_word_lists(),
            tape: Self::default_tape(),
            track_orders: Self::default_track_orders(),
            list_orders: Self::default_list_orders(),
            data_dir: Self::default_data_dir(),
            font: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "ExperimentConfig::default_num_blocks")]
    pub num_blocks: usize,
    #[serde(default = "ExperimentConfig::default_words_per_list")]
    pub words_per_list: usize,
    #[serde(default)]
    pub isi_profile: IsiProfile,
    /// Replaces the profile's range when set.
    #[serde(default)]
    pub isi_override: Option<IsiRange>,
    #[serde(default = "ExperimentConfig::default_poll_interval_us")]
    pub poll_interval_us: u64,
    #[serde(default = "ExperimentConfig::default_calibration_frames")]
    pub calibration_frames: usize,
    #[serde(default = "ExperimentConfig::default_response_key")]
    pub response_key: Key,
    #[serde(default = "ExperimentConfig::default_response_key")]
    pub continue_key: Key,
    #[serde(default = "ExperimentConfig::default_abort_key")]
    pub abort_key: Key,
    /// Background track names, indexed by the counterbalanced track order.
    #[serde(default = "ExperimentConfig::default_tracks")]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl ExperimentConfig {
    fn default_num_blocks() -> usize {
        4
    }
    fn default_words_per_list() -> usize {
        75
    }
    fn default_poll_interval_us() -> u64 {
        250
    }
    fn default_calibration_frames() -> usize {
        60
    }
    fn default_response_key() -> Key {
        Key::Space
    }
    fn default_abort_key() -> Key {
        Key::Escape
    }
    fn default_tracks() -> Vec<String> {
        (1..=4).map(|i| i.to_string()).collect()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let mut config: Self =
            serde_json::from_str(&text).map_err(|e| ConfigError::json(path, e))?;
        if let Some(base) = path.parent() {
            config.paths.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_blocks == 0 {
            return Err(ConfigError::Invalid("num_blocks must be at least 1".into()));
        }
        if self.tracks.len() < self.num_blocks {
            return Err(ConfigError::Invalid(format!(
                "{} blocks need {} tracks, {} configured",
                self.num_blocks,
                self.num_blocks,
                self.tracks.len()
            )));
        }
        if self.abort_key == self.response_key || self.abort_key == self.continue_key {
            return Err(ConfigError::Invalid(
                "abort key must differ from response and continue keys".into(),
            ));
        }
        Ok(())
    }

    pub fn isi_range(&self) -> IsiRange {
        self.isi_override.unwrap_or_else(|| self.isi_profile.range())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Presentation slots per block, the leading dummy included.
    pub fn slots_per_block(&self) -> usize {
        self.words_per_list + 1
    }

    pub fn total_slots(&self) -> usize {
        self.num_blocks * self.slots_per_block()
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_blocks: Self::default_num_blocks(),
            words_per_list: Self::default_words_per_list(),
            isi_profile: IsiProfile::default(),
            isi_override: None,
            poll_interval_us: Self::default_poll_interval_us(),
            calibration_frames: Self::default_calibration_frames(),
            response_key: Self::default_response_key(),
            continue_key: Self::default_response_key(),
            abort_key: Self::default_abort_key(),
            tracks: Self::default_tracks(),
            seed: None,
            paths: PathsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn profiles_match_the_published_ranges() {
        assert_eq!(IsiProfile::Debug.range().candidates(), (10..=20).collect::<Vec<_>>());
        assert_eq!(
            IsiProfile::Session.range().candidates(),
            vec![2500, 2750, 3000, 3250, 3500]
        );
    }

    #[test]
    fn upper_bound_rounds_down_to_the_grid() {
        let range = IsiRange::new(100, 130, 20).unwrap();
        assert_eq!(range.candidates(), vec![100, 120]);
        assert_eq!(range.max_reachable(), 120);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(matches!(
            IsiRange::new(10, 20, 0),
            Err(ConfigError::InvalidIsiRange { .. })
        ));
        assert!(IsiRange::new(30, 20, 1).is_err());
    }

    #[test]
    fn zero_step_in_a_file_is_rejected_at_parse_time() {
        let err = serde_json::from_str::<IsiRange>(r#"{"lower_ms": 10, "upper_ms": 20, "step_ms": 0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid ISI range"));

        let ok: IsiRange =
            serde_json::from_str(r#"{"lower_ms": 10, "upper_ms": 20, "step_ms": 5}"#).unwrap();
        assert_eq!(ok.candidates(), vec![10, 15, 20]);
        assert_eq!(serde_json::to_value(ok).unwrap()["step_ms"], 5);
    }

    #[test]
    fn partial_file_falls_back_to_defaults_and_rebases_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut f = fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{ "isi_profile": "debug", "words_per_list": 3, "paths": {{ "data_dir": "out" }} }}"#
        )
        .unwrap();

        let config = ExperimentConfig::load(&path).unwrap();
        assert_eq!(config.isi_profile, IsiProfile::Debug);
        assert_eq!(config.words_per_list, 3);
        assert_eq!(config.num_blocks, 4);
        assert_eq!(config.total_slots(), 16);
        assert_eq!(config.paths.data_dir, dir.path().join("out"));
        assert_eq!(config.paths.tape, dir.path().join("tape.json"));
    }

    #[test]
    fn abort_key_cannot_double_as_response_key() {
        let config = ExperimentConfig {
            abort_key: Key::Space,
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn profile_parses_case_insensitively() {
        assert_eq!("DEBUG".parse::<IsiProfile>().unwrap(), IsiProfile::Debug);
        assert!("fast".parse::<IsiProfile>().is_err());
    }
}
