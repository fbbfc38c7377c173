use std::fmt;
use std::str::FromStr;

/// Languages the transcription engine can read from or translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    German,
    French,
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::German => "de",
            Language::French => "fr",
            Language::English => "en",
        }
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "de" => Ok(Language::German),
            "fr" => Ok(Language::French),
            "en" => Ok(Language::English),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);
