//! Two-level cache of pattern analyses
//!
//! Results are kept in memory and mirrored into the session store under
//! `pattern_data_{length}-{mode}`. An entry is only reused for the same corpus
//! (fingerprint), the same sampling mode and within one hour.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use diversity_types::{
    DocumentFingerprint, DocumentMatchSet, MatchMode, PatternResult, Presence, SamplingMode,
};

use crate::store::SessionStore;

pub const STORAGE_PREFIX: &str = "pattern_data_";

/// One hour
pub const FRESHNESS_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub pattern_length: u8,
    pub match_mode: MatchMode,
}

impl CacheKey {
    pub fn new(pattern_length: u8, match_mode: MatchMode) -> Self {
        Self {
            pattern_length,
            match_mode,
        }
    }

    pub fn storage_key(&self) -> String {
        format!("{}{}", STORAGE_PREFIX, self)
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (length, mode) = s.split_once('-')?;
        Some(Self::new(length.parse().ok()?, MatchMode::parse(mode)?))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pattern_length, self.match_mode)
    }
}

/// Persisted form of a cached analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPatterns {
    pub key: String,
    pub timestamp: i64,
    #[serde(rename = "samplingMode")]
    pub sampling_mode: SamplingMode,
    #[serde(rename = "documentCount")]
    pub document_count: usize,
    pub digest: String,
    #[serde(rename = "patternCount")]
    pub pattern_count: usize,
    pub patterns: BTreeMap<String, Vec<String>>,
    pub pattern_presence: BTreeMap<String, Presence>,
    pub matches: DocumentMatchSet,
    #[serde(default, rename = "wasSampled")]
    pub was_sampled: bool,
    #[serde(default, rename = "samplingInfo", skip_serializing_if = "Option::is_none")]
    pub sampling_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Expired,
    DifferentCorpus,
    DifferentSampling,
}

impl CachedPatterns {
    pub fn new(
        key: CacheKey,
        result: &PatternResult,
        fingerprint: &DocumentFingerprint,
        sampling_mode: SamplingMode,
        now_ms: i64,
    ) -> Self {
        Self {
            key: key.to_string(),
            timestamp: now_ms,
            sampling_mode,
            document_count: fingerprint.document_count,
            digest: fingerprint.digest.clone(),
            pattern_count: result.pattern_count(),
            patterns: result.patterns.clone(),
            pattern_presence: result.pattern_presence.clone(),
            matches: result.matches.clone(),
            was_sampled: result.was_sampled,
            sampling_info: result.sampling_info.clone(),
        }
    }

    pub fn check(
        &self,
        fingerprint: &DocumentFingerprint,
        sampling_mode: SamplingMode,
        now_ms: i64,
    ) -> Result<(), Staleness> {
        if self.document_count != fingerprint.document_count || self.digest != fingerprint.digest {
            return Err(Staleness::DifferentCorpus);
        }
        if self.sampling_mode != sampling_mode {
            return Err(Staleness::DifferentSampling);
        }
        if now_ms - self.timestamp > FRESHNESS_MS {
            return Err(Staleness::Expired);
        }
        Ok(())
    }

    pub fn to_result(&self) -> PatternResult {
        PatternResult {
            patterns: self.patterns.clone(),
            pattern_presence: self.pattern_presence.clone(),
            matches: self.matches.clone(),
            was_sampled: self.was_sampled,
            sampling_info: self.sampling_info.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Memory,
    Session,
}

pub struct PatternCache<S> {
    store: S,
    memory: HashMap<CacheKey, CachedPatterns>,
}

impl<S: SessionStore> PatternCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            memory: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Find a usable entry, evicting it from both levels if it is stale
    pub fn lookup(
        &mut self,
        key: CacheKey,
        fingerprint: &DocumentFingerprint,
        sampling_mode: SamplingMode,
        now_ms: i64,
    ) -> Option<(CacheSource, PatternResult)> {
        if let Some(entry) = self.memory.get(&key) {
            return match entry.check(fingerprint, sampling_mode, now_ms) {
                Ok(()) => {
                    debug!(%key, "Using in-memory cached data");
                    Some((CacheSource::Memory, entry.to_result()))
                }
                Err(reason) => {
                    info!(%key, ?reason, "Evicting stale cache entry");
                    self.evict(key);
                    None
                }
            };
        }

        let storage_key = key.storage_key();
        let raw = self.store.get(&storage_key)?;
        let entry: CachedPatterns = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%key, error = %e, "Discarding unreadable session entry");
                self.store.remove(&storage_key);
                return None;
            }
        };

        match entry.check(fingerprint, sampling_mode, now_ms) {
            Ok(()) => {
                debug!(%key, "Using persisted data");
                let result = entry.to_result();
                self.memory.insert(key, entry);
                Some((CacheSource::Session, result))
            }
            Err(reason) => {
                info!(%key, ?reason, "Removing stale session entry");
                self.store.remove(&storage_key);
                None
            }
        }
    }

    /// Remember a result. A failed session write is logged and the memory
    /// entry is kept.
    pub fn insert(
        &mut self,
        key: CacheKey,
        result: &PatternResult,
        fingerprint: &DocumentFingerprint,
        sampling_mode: SamplingMode,
        now_ms: i64,
    ) {
        let entry = CachedPatterns::new(key, result, fingerprint, sampling_mode, now_ms);

        match serde_json::to_string(&entry) {
            Ok(json) => match self.store.set(&key.storage_key(), &json) {
                Ok(()) => info!(%key, patterns = entry.pattern_count, "Cached pattern data"),
                Err(e) => warn!(%key, error = %e, "Error persisting pattern data"),
            },
            Err(e) => warn!(%key, error = %e, "Error serializing pattern data"),
        }

        self.memory.insert(key, entry);
    }

    pub fn evict(&mut self, key: CacheKey) {
        self.memory.remove(&key);
        self.store.remove(&key.storage_key());
    }

    pub fn contains_in_memory(&self, key: CacheKey) -> bool {
        self.memory.contains_key(&key)
    }

    /// Drop every cached analysis, including session entries of earlier corpora
    pub fn clear(&mut self) {
        self.memory.clear();
        for key in self.store.keys() {
            if key.starts_with(STORAGE_PREFIX) {
                self.store.remove(&key);
            }
        }
    }
}
