use std::fmt;

/// A relative path inside the media storage root, always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn from_raw(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn join(prefix: &str, filename: &str) -> Self {
        Self(format!("{}/{}", prefix.trim_end_matches('/'), filename))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component.
    pub fn filename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.filename();
        name.rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        self.0 == prefix || self.0.starts_with(&format!("{}/", prefix))
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
