//! Permission governance registry.
//!
//! A permission code is normally declared as a side effect of wiring a route's
//! authorization gate. The registry collects those declarations during startup
//! so role writes can be checked against the set of codes the process actually
//! enforces. Lifecycle: populate, then [`PermissionRegistry::freeze_and_validate`],
//! then read; [`PermissionRegistry::reset_for_test`] only in tests.

use std::collections::{BTreeMap, HashMap};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use serde::Serialize;

use keystone_core::DomainError;

/// Where a code was declared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Declaration {
    pub file: String,
    pub line: u32,
}

impl Declaration {
    fn from_location(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
        }
    }

    /// `file:line` with the directory part stripped.
    pub fn redacted(&self) -> String {
        let base = self
            .file
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown");
        format!("{base}:{}", self.line)
    }
}

impl core::fmt::Display for Declaration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Append-only catalogue of declared permission codes.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    entries: RwLock<HashMap<String, Vec<Declaration>>>,
    validated: AtomicBool,
    validation_gate: Mutex<()>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `code`. Idempotent by code; every call site is remembered.
    ///
    /// Blank codes are ignored.
    #[track_caller]
    pub fn register(&self, code: &str) {
        let location = Location::caller();
        self.register_at(code, location);
    }

    /// Declare several codes at once.
    #[track_caller]
    pub fn register_all<'a, I>(&self, codes: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let location = Location::caller();
        for code in codes {
            self.register_at(code, location);
        }
    }

    fn register_at(&self, code: &str, location: &Location<'_>) {
        let code = code.trim();
        if code.is_empty() {
            return;
        }
        let declaration = Declaration::from_location(location);
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sites = entries.entry(code.to_string()).or_default();
        if !sites.contains(&declaration) {
            sites.push(declaration);
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        if code.is_empty() {
            return false;
        }
        match self.entries.read() {
            Ok(e) => e.contains_key(code),
            Err(poisoned) => poisoned.into_inner().contains_key(code),
        }
    }

    pub fn count(&self) -> usize {
        match self.entries.read() {
            Ok(e) => e.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.validated.load(Ordering::Acquire)
    }

    /// Fail-close check that the host finished declaring codes.
    ///
    /// An empty registry is an `Internal` error: every later governance check
    /// would run against an empty allow-list. Success is cached and the check
    /// runs at most once successfully, even under concurrent first use. Failure
    /// is not cached.
    pub fn freeze_and_validate(&self) -> Result<(), DomainError> {
        if self.validated.load(Ordering::Acquire) {
            return Ok(());
        }

        let _gate = match self.validation_gate.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.validated.load(Ordering::Acquire) {
            return Ok(());
        }

        let count = self.count();
        if count == 0 {
            tracing::error!("permission registry is empty at freeze time");
            return Err(DomainError::internal(
                "permission registry is empty: declare permission codes while assembling \
                 routes (or register them at startup) before validating",
            ));
        }

        self.validated.store(true, Ordering::Release);
        tracing::info!(permissions = count, "permission registry frozen");
        Ok(())
    }

    /// Declared codes, sorted.
    pub fn codes(&self) -> Vec<String> {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut out: Vec<String> = entries.keys().cloned().collect();
        out.sort();
        out
    }

    /// Codes with the full call sites that declared them.
    pub fn declarations(&self) -> BTreeMap<String, Vec<String>> {
        self.collect_sites(|d| d.to_string())
    }

    /// Codes with call sites reduced to `file:line`.
    pub fn redacted_declarations(&self) -> BTreeMap<String, Vec<String>> {
        self.collect_sites(Declaration::redacted)
    }

    fn collect_sites<F>(&self, render: F) -> BTreeMap<String, Vec<String>>
    where
        F: Fn(&Declaration) -> String,
    {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .iter()
            .map(|(code, sites)| {
                let mut rendered: Vec<String> = sites.iter().map(&render).collect();
                rendered.sort();
                (code.clone(), rendered)
            })
            .collect()
    }

    /// Clear every declaration and the frozen flag.
    pub fn reset_for_test(&self) {
        let _gate = match self.validation_gate.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.entries.write() {
            Ok(mut e) => e.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        self.validated.store(false, Ordering::Release);
    }
}
