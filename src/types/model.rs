use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A Groq model identifier.
///
/// Known models get their own variant; anything else the endpoint accepts can be carried as a
/// custom string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier (for models added after this release)
    Custom(String),
}

/// Models hosted by Groq that the client knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// Llama 3.1 8B, tuned for low latency.  The default.
    #[serde(rename = "llama-3.1-8b-instant")]
    Llama31_8bInstant,

    /// Llama 3.3 70B general purpose model.
    #[serde(rename = "llama-3.3-70b-versatile")]
    Llama33_70bVersatile,

    /// Llama 4 Scout, accepts image input.
    #[serde(rename = "meta-llama/llama-4-scout-17b-16e-instruct")]
    Llama4Scout,

    /// Llama 4 Maverick, accepts image input.
    #[serde(rename = "meta-llama/llama-4-maverick-17b-128e-instruct")]
    Llama4Maverick,

    /// Mixtral 8x7B with a 32k context.
    #[serde(rename = "mixtral-8x7b-32768")]
    Mixtral8x7b,

    /// Gemma 2 9B instruction tuned.
    #[serde(rename = "gemma2-9b-it")]
    Gemma2_9bIt,
}

impl KnownModel {
    /// Every known model, in the order they are offered to the user.
    pub const ALL: [KnownModel; 6] = [
        KnownModel::Llama31_8bInstant,
        KnownModel::Llama33_70bVersatile,
        KnownModel::Llama4Scout,
        KnownModel::Llama4Maverick,
        KnownModel::Mixtral8x7b,
        KnownModel::Gemma2_9bIt,
    ];

    /// The identifier sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            KnownModel::Llama31_8bInstant => "llama-3.1-8b-instant",
            KnownModel::Llama33_70bVersatile => "llama-3.3-70b-versatile",
            KnownModel::Llama4Scout => "meta-llama/llama-4-scout-17b-16e-instruct",
            KnownModel::Llama4Maverick => "meta-llama/llama-4-maverick-17b-128e-instruct",
            KnownModel::Mixtral8x7b => "mixtral-8x7b-32768",
            KnownModel::Gemma2_9bIt => "gemma2-9b-it",
        }
    }

    /// A short label for status lines, e.g. "Llama 3.1 8b instant".
    pub fn label(self) -> String {
        let id = self.as_str();
        let id = id.rsplit('/').next().unwrap_or(id);
        id.replacen("llama-", "Llama ", 1)
            .replacen("mixtral-", "Mixtral ", 1)
            .replace('-', " ")
    }

    /// True when the model accepts `image_url` content parts.
    pub fn supports_images(self) -> bool {
        matches!(self, KnownModel::Llama4Scout | KnownModel::Llama4Maverick)
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::Llama31_8bInstant)
    }
}

impl Model {
    /// True unless the model is known to reject image content.  Custom ids get the benefit of
    /// the doubt.
    pub fn accepts_images(&self) -> bool {
        match self {
            Model::Known(known) => known.supports_images(),
            Model::Custom(_) => true,
        }
    }

    /// The identifier sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Model::Known(known) => known.as_str(),
            Model::Custom(custom) => custom,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KnownModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KnownModel::ALL
            .into_iter()
            .find(|known| known.as_str() == s)
            .ok_or_else(|| format!("unknown model: {s}"))
    }
}

impl FromStr for Model {
    type Err = String;

    /// Unknown identifiers become [`Model::Custom`]; only an empty name is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("model name must not be empty".to_string());
        }
        Ok(s.parse::<KnownModel>()
            .map(Model::Known)
            .unwrap_or_else(|_| Model::Custom(s.to_string())))
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        model
            .parse()
            .unwrap_or_else(|_| Model::Custom(model.to_string()))
    }
}
