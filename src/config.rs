//! Global configuration options.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::OnceLock;

/// Global configuration options.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
/// [`ReadOptions`](crate::array::ReadOptions) and [`WriteOptions`](crate::array::WriteOptions) take their defaults from it
/// and can be overridden for any individual call.
///
/// ## Validate Checksums
///  > default: [`true`]
///
/// If enabled, the `crc32c` codec and the shard index checksum are verified on decode, otherwise verification is skipped.
///
/// ## Strict Reads
///  > default: [`false`]
///
/// If enabled, a read fails on the first chunk which cannot be retrieved or decoded.
/// Otherwise such chunks are filled with the fill value and reported alongside the returned bytes.
///
/// ## Parallel Chunks
///  > default: [`true`]
///
/// If enabled, chunks are encoded and decoded concurrently on the [`rayon`] global thread pool.
#[derive(Debug, Clone)]
pub struct Config {
    validate_checksums: bool,
    strict_reads: bool,
    parallel_chunks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validate_checksums: true,
            strict_reads: false,
            parallel_chunks: true,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) -> &mut Self {
        self.validate_checksums = validate_checksums;
        self
    }

    /// Get the [strict reads](#strict-reads) configuration.
    #[must_use]
    pub fn strict_reads(&self) -> bool {
        self.strict_reads
    }

    /// Set the [strict reads](#strict-reads) configuration.
    pub fn set_strict_reads(&mut self, strict_reads: bool) -> &mut Self {
        self.strict_reads = strict_reads;
        self
    }

    /// Get the [parallel chunks](#parallel-chunks) configuration.
    #[must_use]
    pub fn parallel_chunks(&self) -> bool {
        self.parallel_chunks
    }

    /// Set the [parallel chunks](#parallel-chunks) configuration.
    pub fn set_parallel_chunks(&mut self, parallel_chunks: bool) -> &mut Self {
        self.parallel_chunks = parallel_chunks;
        self
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// Holding the guard while calling [`global_config_mut`] on the same thread deadlocks.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global configuration.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert!(config.validate_checksums());
        assert!(!config.strict_reads());
        assert!(config.parallel_chunks());
        assert!(global_config().validate_checksums());
    }

    #[test]
    fn config_setters() {
        let mut config = Config::default();
        config.set_strict_reads(true).set_parallel_chunks(false);
        assert!(config.strict_reads());
        assert!(!config.parallel_chunks());
    }
}
