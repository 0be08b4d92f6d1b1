use std::fmt;

// Longest readable prefix kept in a file name, leaving room for the digest
const MAX_READABLE_LEN: usize = 128;

const EXTENSION: &str = ".cache";

/// Stable identifier for a URL, used both as the memory cache key and as the
/// on-disk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &str) -> Self {
        let stripped = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);

        let mut readable: String = stripped
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '-',
            })
            .take(MAX_READABLE_LEN)
            .collect();

        // A leading dot would make a hidden file
        if readable.starts_with('.') {
            readable.replace_range(..1, "-");
        }

        CacheKey(format!("{}-{:x}{}", readable, md5::compute(url.as_bytes()), EXTENSION))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
