//! Configuration management

use crate::phonology::variants::DEFAULT_VARIANT;
use crate::phonology::{PhonologyOptions, PhonologySelection};
use crate::speech::{OrchestratorSettings, SpectrogramSettings};
use crate::{PieError, Result};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest and highest supported output sample rates
const SAMPLE_RATE_RANGE: (u32, u32) = (8_000, 96_000);

/// Application configuration
///
/// Persistent settings for phonology selection, synthesis and
/// spectrogram output, stored as INI.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.pietts.cfg unless loaded from elsewhere)
    path: PathBuf,
}

impl Config {
    /// Load configuration from disk or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load a specific config file, creating it with defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(path)
                .map_err(|e| PieError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(path)
                .map_err(|e| PieError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self {
            ini,
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| PieError::Config(format!("Failed to save config: {}", e)))
    }

    /// Get config file path (~/.pietts.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pietts.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Create default configuration
    ///
    /// Phonology sub-options are left out so each variant starts from its
    /// usual options.
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("phonology"))
            .set("variant", DEFAULT_VARIANT);

        ini.with_section(Some("speech"))
            .set("backend", "formant")
            .set("sample_rate", "22050")
            .set("minor_pause_ms", "250")
            .set("major_pause_ms", "600")
            .set("pitch_hz", "120")
            .set("concurrent", "false")
            .set("espeak_voice", "en");

        ini.with_section(Some("spectrogram"))
            .set("fft_size", "512")
            .set("hop_size", "128");

        ini.with_section(Some("lexicon"));

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i32) -> i32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Integer setting within `min..=max`, default otherwise
    fn get_ranged(&self, section: &str, key: &str, default: u32, min: u32, max: u32) -> u32 {
        let raw = self.get_int(section, key, default as i32);
        match u32::try_from(raw).ok().filter(|v| (min..=max).contains(v)) {
            Some(v) => v,
            None => {
                warn!(
                    "[{}] {} = {} is out of range ({}..={}), using {}",
                    section, key, raw, min, max, default
                );
                default
            }
        }
    }

    // Phonology

    /// Selected variant id
    pub fn variant(&self) -> String {
        self.get_string("phonology", "variant", DEFAULT_VARIANT)
            .trim()
            .to_string()
    }

    /// Variant and sub-options; options missing from the file take the
    /// variant's usual values
    pub fn phonology_selection(&self) -> PhonologySelection {
        let variant = self.variant();
        let usual = PhonologyOptions::for_variant(&variant);
        let options = PhonologyOptions {
            colored_laryngeals: self.get_bool(
                "phonology",
                "colored_laryngeals",
                usual.colored_laryngeals,
            ),
            palatals: self.get_bool("phonology", "palatals", usual.palatals),
            breathy_aspirates: self.get_bool(
                "phonology",
                "breathy_aspirates",
                usual.breathy_aspirates,
            ),
            syllabic_resonants: self.get_bool(
                "phonology",
                "syllabic_resonants",
                usual.syllabic_resonants,
            ),
        };
        PhonologySelection::with_options(&variant, options)
    }

    /// Remember a selection so the next run starts with it
    pub fn set_phonology_selection(&mut self, selection: &PhonologySelection) {
        let o = selection.options;
        self.set("phonology", "variant", &selection.variant);
        self.set("phonology", "colored_laryngeals", &o.colored_laryngeals.to_string());
        self.set("phonology", "palatals", &o.palatals.to_string());
        self.set("phonology", "breathy_aspirates", &o.breathy_aspirates.to_string());
        self.set("phonology", "syllabic_resonants", &o.syllabic_resonants.to_string());
    }

    /// Directory scanned for custom variant definitions
    pub fn variant_dir(&self) -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pietts")
            .join("variants")
    }

    // Speech

    /// Backend name: "formant" or "espeak"
    pub fn backend_name(&self) -> String {
        self.get_string("speech", "backend", "formant")
            .trim()
            .to_lowercase()
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        let (min, max) = SAMPLE_RATE_RANGE;
        self.get_ranged("speech", "sample_rate", 22_050, min, max)
    }

    /// Silence after a comma-like pause
    pub fn minor_pause(&self) -> Duration {
        Duration::from_millis(self.get_ranged("speech", "minor_pause_ms", 250, 0, 10_000) as u64)
    }

    /// Silence after a sentence-like pause
    pub fn major_pause(&self) -> Duration {
        Duration::from_millis(self.get_ranged("speech", "major_pause_ms", 600, 0, 10_000) as u64)
    }

    /// Base voice pitch for the formant synthesizer
    pub fn pitch_hz(&self) -> f64 {
        let pitch = self.get_float("speech", "pitch_hz", 120.0);
        if (50.0..=400.0).contains(&pitch) {
            pitch as f64
        } else {
            warn!("[speech] pitch_hz = {} is out of range (50..=400), using 120", pitch);
            120.0
        }
    }

    /// Render segments in parallel
    pub fn concurrent(&self) -> bool {
        self.get_bool("speech", "concurrent", false)
    }

    /// espeak-ng voice
    pub fn espeak_voice(&self) -> String {
        self.get_string("speech", "espeak_voice", "en").trim().to_string()
    }

    // Spectrogram

    pub fn spectrogram_settings(&self) -> SpectrogramSettings {
        let defaults = SpectrogramSettings::default();
        let settings = SpectrogramSettings {
            fft_size: self.get_ranged("spectrogram", "fft_size", defaults.fft_size as u32, 16, 65_536)
                as usize,
            hop_size: self.get_ranged("spectrogram", "hop_size", defaults.hop_size as u32, 1, 65_536)
                as usize,
        };
        match settings.validate() {
            Ok(()) => settings,
            Err(e) => {
                warn!("{}, using default spectrogram settings", e);
                defaults
            }
        }
    }

    // Lexicon

    /// Word-list file replacing the bundled lists
    pub fn lexicon_path(&self) -> Option<PathBuf> {
        self.ini
            .get_from(Some("lexicon"), "path")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Everything the orchestrator needs from the config
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            minor_pause: self.minor_pause(),
            major_pause: self.major_pause(),
            concurrent: self.concurrent(),
            sample_rate: self.sample_rate(),
            spectrogram: self.spectrogram_settings(),
        }
    }
}
