use std::time::SystemTime;

/// Generated module text for one template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub contents: String,
    /// Taken before the source was read, so an edit racing the compile
    /// makes the entry stale rather than hiding the edit.
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Valid,
    Stale,
}

impl CacheEntry {
    pub fn new(contents: impl Into<String>, timestamp: SystemTime) -> Self {
        Self {
            contents: contents.into(),
            timestamp,
        }
    }

    /// Checks the entry against the file's current modification time.
    ///
    /// The entry stays valid unless the file was modified strictly after
    /// the entry's timestamp. A failure to read the modification time
    /// counts as stale.
    pub fn validate<E>(&self, current_mod_time: Result<SystemTime, E>) -> Freshness {
        match current_mod_time {
            Ok(modified) if modified <= self.timestamp => Freshness::Valid,
            _ => Freshness::Stale,
        }
    }
}
