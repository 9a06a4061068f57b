//! Open options for HelixKV stores
//!
//! Centralized configuration with sensible defaults. The universal flags are
//! interpreted by the store core; everything else is an opaque string-keyed
//! bag passed through to the backend.

use std::collections::HashMap;

/// Options controlling how a store is opened
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    // -------------------------------------------------------------------------
    // Universal Flags
    // -------------------------------------------------------------------------
    /// Discard any existing content on open
    pub truncate: bool,

    /// Fail instead of creating a missing database file
    pub no_create: bool,

    /// Do not wait for a cross-process lock (accepted for compatibility;
    /// the bundled backends are single-process)
    pub no_wait: bool,

    /// Skip cross-process file locking (accepted for compatibility)
    pub no_lock: bool,

    // -------------------------------------------------------------------------
    // Backend Parameters
    // -------------------------------------------------------------------------
    /// Backend-defined tuning parameters, e.g. `backend=tree` or
    /// `comparator=pair`; unrecognized tuning keys are ignored by the
    /// bundled backends
    pub params: HashMap<String, String>,
}

impl OpenOptions {
    /// Create a new options builder
    pub fn builder() -> OpenOptionsBuilder {
        OpenOptionsBuilder::default()
    }

    /// Build options from a `"key1=value1,key2=value2"` parameter string
    ///
    /// The universal flags are lifted out of the bag; a flag is set when its
    /// value is `true` or `1`.
    pub fn from_params(expr: &str) -> Self {
        let mut params = parse_params(expr);
        let mut opts = Self::default();
        opts.truncate = take_flag(&mut params, "truncate");
        opts.no_create = take_flag(&mut params, "no_create");
        opts.no_wait = take_flag(&mut params, "no_wait");
        opts.no_lock = take_flag(&mut params, "no_lock");
        opts.params = params;
        opts
    }

    /// Look up a backend parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Builder for OpenOptions
#[derive(Default)]
pub struct OpenOptionsBuilder {
    opts: OpenOptions,
}

impl OpenOptionsBuilder {
    /// Discard existing content on open
    pub fn truncate(mut self, yes: bool) -> Self {
        self.opts.truncate = yes;
        self
    }

    /// Fail instead of creating a missing database file
    pub fn no_create(mut self, yes: bool) -> Self {
        self.opts.no_create = yes;
        self
    }

    /// Do not wait for a cross-process lock
    pub fn no_wait(mut self, yes: bool) -> Self {
        self.opts.no_wait = yes;
        self
    }

    /// Skip cross-process file locking
    pub fn no_lock(mut self, yes: bool) -> Self {
        self.opts.no_lock = yes;
        self
    }

    /// Set a backend parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.params.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> OpenOptions {
        self.opts
    }
}

/// Parse a `"key1=value1,key2=value2"` parameter string into a map
///
/// Empty segments and segments without `=` are ignored; the last occurrence
/// of a duplicate key wins.
pub fn parse_params(expr: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for segment in expr.split(',') {
        if segment.is_empty() {
            continue;
        }
        if let Some((key, value)) = segment.split_once('=') {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

/// Remove a boolean flag from the parameter bag
fn take_flag(params: &mut HashMap<String, String>, key: &str) -> bool {
    match params.remove(key) {
        Some(v) => v == "true" || v == "1",
        None => false,
    }
}
