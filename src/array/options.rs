//! Options for reading and writing array data.

use crate::config::global_config;

/// Options for reading array data.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    strict: bool,
    parallel: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        let config = global_config();
        Self {
            strict: config.strict_reads(),
            parallel: config.parallel_chunks(),
        }
    }
}

impl ReadOptions {
    /// Return true if a read fails on the first chunk which cannot be read.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Set strict reading.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Return true if chunks are decoded concurrently.
    #[must_use]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Set concurrent chunk decoding.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Options for writing array data.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    parallel: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            parallel: global_config().parallel_chunks(),
        }
    }
}

impl WriteOptions {
    /// Return true if chunks are encoded and stored concurrently.
    #[must_use]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Set concurrent chunk encoding.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_options() {
        let options = ReadOptions::default().with_strict(true).with_parallel(false);
        assert!(options.strict());
        assert!(!options.parallel());
        assert!(!WriteOptions::default().with_parallel(false).parallel());
    }
}
