//! Configuration types for the chat application.
//!
//! Command-line arguments are parsed with `arrrg`.  They are resolved once, together with the
//! stored preferences, into a [`ChatConfig`] that is handed to whatever needs it.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};
use crate::render::Theme;
use crate::storage::Preferences;
use crate::typewriter::DEFAULT_TICK;
use crate::types::{Locale, Model};

/// Directory name under the platform data directory.
const DATA_DIR_NAME: &str = "groqchat";

/// Command-line arguments for the groqchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: llama-3.1-8b-instant)", "MODEL")]
    pub model: Option<String>,

    /// Interface language.
    #[arrrg(optional, "Interface language, tr or en (default: stored or tr)", "LANG")]
    pub lang: Option<String>,

    /// Display name.
    #[arrrg(optional, "Display name (default: stored or Misafir)", "NAME")]
    pub username: Option<String>,

    /// Where history and preferences live.
    #[arrrg(optional, "Data directory (default: platform data dir)/groqchat", "DIR")]
    pub data_dir: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: endpoint default)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature, 0 to 2 (default: endpoint default)", "TEMP")]
    pub temperature: Option<String>,

    /// Typing-effect interval in milliseconds.
    #[arrrg(optional, "Milliseconds per revealed character (default: 10)", "MS")]
    pub tick_ms: Option<u64>,

    /// External speech-to-text command.
    #[arrrg(optional, "Speech-to-text command; {lang} becomes tr-TR/en-US", "CMD")]
    pub voice_command: Option<String>,

    /// Use the light palette.
    #[arrrg(flag, "Use the light palette")]
    pub light: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for a chat run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model replies come from.
    pub model: Model,

    /// Interface language.
    pub locale: Locale,

    /// Palette.
    pub theme: Theme,

    /// Display name.
    pub username: String,

    /// Maximum tokens per response; `None` leaves it to the endpoint.
    pub max_tokens: Option<u32>,

    /// Sampling temperature; `None` leaves it to the endpoint.
    pub temperature: Option<f32>,

    /// Interval between revealed characters.
    pub tick: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Speech-to-text command, if any.
    pub voice_command: Option<String>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: llama-3.1-8b-instant
    /// - Language: Turkish
    /// - Theme: dark
    /// - Tick: 10ms
    pub fn new() -> Self {
        Self::from_preferences(&Preferences::default())
    }

    /// Defaults with the stored preferences applied.
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            model: Model::default(),
            locale: prefs.locale,
            theme: Theme::from_dark_mode(prefs.dark_mode),
            username: prefs.username.clone(),
            max_tokens: None,
            temperature: None,
            tick: DEFAULT_TICK,
            use_color: true,
            voice_command: None,
        }
    }

    /// Layer command-line arguments over stored preferences.
    pub fn resolve(args: ChatArgs, prefs: &Preferences) -> Result<Self> {
        let mut config = Self::from_preferences(prefs);
        if let Some(model) = args.model {
            config.model = model
                .parse()
                .map_err(|err: String| Error::validation(err, Some("model".to_string())))?;
        }
        if let Some(lang) = args.lang {
            config.locale = lang
                .parse()
                .map_err(|err: String| Error::validation(err, Some("lang".to_string())))?;
        }
        if let Some(username) = args.username.filter(|name| !name.trim().is_empty()) {
            config.username = username;
        }
        if args.light {
            config.theme = Theme::Light;
        }
        config.max_tokens = args.max_tokens;
        if let Some(raw) = args.temperature {
            config.temperature = Some(parse_temperature(&raw)?);
        }
        if let Some(ms) = args.tick_ms {
            config.tick = Duration::from_millis(ms);
        }
        config.use_color = !args.no_color;
        config.voice_command = args.voice_command;
        Ok(config)
    }

    /// Sets the language.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Sets the typing-effect interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_temperature(raw: &str) -> Result<f32> {
    let param = Some("temperature".to_string());
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| Error::validation(format!("not a number: {raw}"), param.clone()))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(Error::validation(
            format!("temperature must be between 0 and 2, got {value}"),
            param,
        ));
    }
    Ok(value)
}

/// The explicitly requested data directory, or the platform default.
pub fn data_dir(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .ok_or_else(|| {
            Error::validation(
                "no data directory on this platform; pass --data-dir",
                Some("data-dir".to_string()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, Model::Known(KnownModel::Llama31_8bInstant));
        assert_eq!(config.locale, Locale::Tr);
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.username, "Misafir");
        assert_eq!(config.tick, Duration::from_millis(10));
        assert!(config.use_color);
        assert!(config.max_tokens.is_none());
        assert!(config.voice_command.is_none());
        assert!(config.temperature.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::resolve(ChatArgs::default(), &Preferences::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn stored_preferences_apply() {
        let prefs = Preferences {
            locale: Locale::En,
            dark_mode: false,
            username: "Deniz".to_string(),
        };
        let config = ChatConfig::resolve(ChatArgs::default(), &prefs).unwrap();
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.username, "Deniz");
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("llama-3.3-70b-versatile".to_string()),
            lang: Some("en".to_string()),
            username: Some("Ali".to_string()),
            data_dir: Some("/tmp/groqchat".to_string()),
            max_tokens: Some(512),
            temperature: Some("0.6".to_string()),
            tick_ms: Some(25),
            voice_command: Some("stt {lang}".to_string()),
            light: true,
            no_color: true,
        };
        let config = ChatConfig::resolve(args, &Preferences::default()).unwrap();
        assert_eq!(config.model, Model::Known(KnownModel::Llama33_70bVersatile));
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.username, "Ali");
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(config.temperature, Some(0.6));
        assert_eq!(config.tick, Duration::from_millis(25));
        assert_eq!(config.voice_command.as_deref(), Some("stt {lang}"));
        assert_eq!(config.theme, Theme::Light);
        assert!(!config.use_color);
    }

    #[test]
    fn bad_language_is_rejected() {
        let args = ChatArgs {
            lang: Some("fr".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::resolve(args, &Preferences::default()).is_err());
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        for raw in ["2.5", "-0.1", "warm"] {
            let args = ChatArgs {
                temperature: Some(raw.to_string()),
                ..ChatArgs::default()
            };
            let err = ChatConfig::resolve(args, &Preferences::default()).unwrap_err();
            assert!(err.to_string().contains("temperature") || err.to_string().contains(raw));
        }
    }

    #[test]
    fn explicit_data_dir_wins() {
        assert_eq!(data_dir(Some("/x")).unwrap(), PathBuf::from("/x"));
    }
}
