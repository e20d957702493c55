/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Configuration for zspace.
//!
//! Settings are read once from the environment into a process-wide
//! instance. Tests that need different settings take the global lock
//! and override values temporarily; the previous configuration is
//! restored when the lock is dropped.

use std::env;

/// Environment variable toggling overflow detection in cellwise
/// arithmetic.
pub const CHECKED_ARITHMETIC_ENV: &str = "ZSPACE_CHECKED_ARITHMETIC";

/// Environment variable bounding the number of cells a single
/// allocation may request.
pub const MAX_CELLS_ENV: &str = "ZSPACE_MAX_CELLS";

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// When set, `+ - * pow` fail with an arithmetic error on `i32`
    /// overflow; otherwise they wrap.
    pub checked_arithmetic: bool,

    /// Largest cell count a freshly allocated tensor may hold.
    pub max_cells: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checked_arithmetic: true,
            max_cells: i32::MAX as usize,
        }
    }
}

/// Load configuration from environment variables.
pub fn from_env() -> Config {
    from_lookup(|key| env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
/// Unparseable values fall back to the defaults.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let mut config = Config::default();

    if let Some(val) = lookup(CHECKED_ARITHMETIC_ENV) {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.checked_arithmetic = true,
            "0" | "false" | "no" | "off" => config.checked_arithmetic = false,
            other => tracing::warn!("ignoring {}={:?}", CHECKED_ARITHMETIC_ENV, other),
        }
    }

    if let Some(val) = lookup(MAX_CELLS_ENV) {
        match val.trim().parse::<usize>() {
            Ok(parsed) => config.max_cells = parsed,
            Err(_) => tracing::warn!("ignoring {}={:?}", MAX_CELLS_ENV, val),
        }
    }

    config
}

/// Global configuration functions
pub mod global {
    use std::sync::Arc;
    use std::sync::LazyLock;
    use std::sync::Mutex;
    use std::sync::MutexGuard;
    use std::sync::PoisonError;
    use std::sync::RwLock;

    use super::*;

    /// Global configuration instance, initialized from environment variables.
    static CONFIG: LazyLock<Arc<RwLock<Config>>> =
        LazyLock::new(|| Arc::new(RwLock::new(from_env())));

    static CONFIG_LOCK: Mutex<()> = Mutex::new(());

    /// Get a snapshot of the global configuration.
    pub fn get() -> Config {
        CONFIG
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the global configuration.
    pub fn set(config: Config) {
        *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Reset the global configuration to defaults (for testing only)
    pub fn reset_to_defaults() {
        set(Config::default());
    }

    /// Exclusive access to the global configuration. Restores the
    /// configuration captured at acquisition when dropped.
    pub struct ConfigLock {
        saved: Config,
        _guard: MutexGuard<'static, ()>,
    }

    impl ConfigLock {
        /// Apply `f` to the global configuration while the lock is
        /// held.
        pub fn modify(&self, f: impl FnOnce(&mut Config)) {
            let mut config = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut config);
        }
    }

    impl Drop for ConfigLock {
        fn drop(&mut self) {
            set(self.saved.clone());
        }
    }

    /// Acquire the global configuration lock for testing.
    pub fn lock() -> ConfigLock {
        let guard = CONFIG_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        ConfigLock {
            saved: get(),
            _guard: guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.checked_arithmetic);
        assert_eq!(config.max_cells, i32::MAX as usize);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [(CHECKED_ARITHMETIC_ENV, "off"), (MAX_CELLS_ENV, "1024")]
            .into_iter()
            .collect();
        let config = from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert!(!config.checked_arithmetic);
        assert_eq!(config.max_cells, 1024);
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = from_lookup(|key| match key {
            CHECKED_ARITHMETIC_ENV => Some("maybe".to_string()),
            MAX_CELLS_ENV => Some("-3".to_string()),
            _ => None,
        });
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_global_config() {
        let lock = global::lock();
        global::reset_to_defaults();
        assert!(global::get().checked_arithmetic);

        lock.modify(|c| c.max_cells = usize::MAX);
        assert_eq!(global::get().max_cells, usize::MAX);

        global::reset_to_defaults();
        assert_eq!(global::get(), Config::default());
    }
}
