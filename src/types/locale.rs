use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The user-facing language.
///
/// Stored under the `language` key as `"tr"` or `"en"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Turkish.  The default.
    #[default]
    Tr,
    /// English.
    En,
}

/// Every string the client shows that depends on the locale.
#[derive(Debug)]
pub struct Translations {
    /// First message of every session.
    pub welcome: &'static str,
    /// Title given to a freshly created session.
    pub new_chat: &'static str,
    /// Title used when the first turn is a bare attachment.
    pub file_upload: &'static str,
    /// Alt text for embedded images.
    pub image_alt: &'static str,
    /// Marker appended when an attachment cannot be read.
    pub file_read_error: &'static str,
    /// Alert shown when no speech recognizer is available.
    pub voice_unsupported: &'static str,
    /// Shown while waiting on the speech recognizer.
    pub listening: &'static str,
    /// Delete confirmation prompt.
    pub confirm_delete: &'static str,
    /// Heading for pinned sessions.
    pub pinned: &'static str,
    /// Heading for the remaining sessions.
    pub recents: &'static str,
    /// Shown when there are no unpinned sessions.
    pub no_recent_chats: &'static str,
    /// Default display name.
    pub guest: &'static str,
    /// Input prompt.
    pub input_placeholder: &'static str,
    /// Suggested first prompts for an empty session.
    pub suggestions: [&'static str; 4],
    /// Relative date labels: today, yesterday, last week, last month.
    pub today: &'static str,
    /// See [`Translations::today`].
    pub yesterday: &'static str,
    /// See [`Translations::today`].
    pub previous_7_days: &'static str,
    /// See [`Translations::today`].
    pub previous_30_days: &'static str,
    /// Month names, January first.
    pub months: [&'static str; 12],
}

const TR: Translations = Translations {
    welcome: "Merhaba! Size nasıl yardımcı olabilirim?",
    new_chat: "Yeni Sohbet",
    file_upload: "Dosya Gönderimi",
    image_alt: "Görsel",
    file_read_error: "[Dosya yüklenirken hata oluştu]",
    voice_unsupported: "Sisteminiz ses tanıma özelliğini desteklemiyor.",
    listening: "Dinleniyor...",
    confirm_delete: "Emin misin?",
    pinned: "Sabitlenenler",
    recents: "Geçmiş",
    no_recent_chats: "Geçmiş sohbet yok",
    guest: "Misafir",
    input_placeholder: "Mesajınızı yazın...",
    suggestions: [
        "Bana bir hikaye anlat",
        "Bu kodu açıkla",
        "Bir e-posta taslağı yaz",
        "Yeni bir konu öğrenmeme yardım et",
    ],
    today: "Bugün",
    yesterday: "Dün",
    previous_7_days: "Önceki 7 Gün",
    previous_30_days: "Önceki 30 Gün",
    months: [
        "Ocak", "Şubat", "Mart", "Nisan", "Mayıs", "Haziran", "Temmuz", "Ağustos", "Eylül",
        "Ekim", "Kasım", "Aralık",
    ],
};

const EN: Translations = Translations {
    welcome: "Hello! How can I help you?",
    new_chat: "New Chat",
    file_upload: "File Upload",
    image_alt: "Image",
    file_read_error: "[Error while loading file]",
    voice_unsupported: "Speech recognition is not supported on this system.",
    listening: "Listening...",
    confirm_delete: "Are you sure?",
    pinned: "Pinned",
    recents: "Recents",
    no_recent_chats: "No recent chats",
    guest: "Guest",
    input_placeholder: "Type your message...",
    suggestions: [
        "Tell me a story",
        "Explain this code",
        "Draft an email",
        "Help me learn a new topic",
    ],
    today: "Today",
    yesterday: "Yesterday",
    previous_7_days: "Previous 7 Days",
    previous_30_days: "Previous 30 Days",
    months: [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ],
};

impl Locale {
    /// The stored form of the locale.
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Tr => "tr",
            Locale::En => "en",
        }
    }

    /// BCP 47 tag handed to the speech recognizer.
    pub fn language_tag(self) -> &'static str {
        match self {
            Locale::Tr => "tr-TR",
            Locale::En => "en-US",
        }
    }

    /// The other locale.
    pub fn toggled(self) -> Self {
        match self {
            Locale::Tr => Locale::En,
            Locale::En => Locale::Tr,
        }
    }

    /// The string table for this locale.
    pub fn strings(self) -> &'static Translations {
        match self {
            Locale::Tr => &TR,
            Locale::En => &EN,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tr" | "tr-tr" | "turkish" => Ok(Locale::Tr),
            "en" | "en-us" | "en-gb" | "english" => Ok(Locale::En),
            other => Err(format!("unsupported language: {other} (expected tr or en)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_messages() {
        assert_eq!(Locale::En.strings().welcome, "Hello! How can I help you?");
        assert_eq!(
            Locale::Tr.strings().welcome,
            "Merhaba! Size nasıl yardımcı olabilirim?"
        );
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("tr-TR".parse::<Locale>().unwrap(), Locale::Tr);
        assert!("de".parse::<Locale>().is_err());
        assert_eq!(Locale::En.to_string(), "en");
    }

    #[test]
    fn toggle_round_trips() {
        assert_eq!(Locale::Tr.toggled(), Locale::En);
        assert_eq!(Locale::Tr.toggled().toggled(), Locale::Tr);
    }

    #[test]
    fn default_is_turkish() {
        assert_eq!(Locale::default(), Locale::Tr);
    }
}
