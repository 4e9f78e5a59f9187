//! Engine settings, as they come out of a configuration file

use crate::{
    engine::{Engine, Strategy},
    error::{Error, Result},
    thread::{self, ForkJoin, Rayon, ScopedThreads, Sequential},
};
use serde::Deserialize;
use std::{fs, path::Path};

/// Fork-join substrate to run tiles on
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Everything on the calling thread
    Sequential,

    /// Fresh scoped OS threads for every invocation
    Threads,

    /// The rayon global thread pool, or a dedicated one if a thread count is
    /// specified
    #[default]
    Rayon,
}

/// Settings needed to build an `Engine`
///
/// Every field is optional in the configuration file:
///
/// ```toml
/// tile_count = 256
/// strategy = "upsweep_downsweep"
/// backend = "threads"
/// threads = 8
/// ```
///
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of tiles the input is split into
    pub tile_count: u32,

    /// Way of propagating aggregates across tiles
    pub strategy: Strategy,

    /// Fork-join substrate
    pub backend: Backend,

    /// Number of threads, defaults to one per hardware thread
    ///
    /// Ignored by the sequential backend.
    pub threads: Option<usize>,
}
//
impl Default for Config {
    fn default() -> Self {
        Self {
            tile_count: 1024,
            strategy: Strategy::default(),
            backend: Backend::default(),
            threads: None,
        }
    }
}
//
impl Config {
    /// Parse and validate a TOML configuration
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading engine configuration from {}", path.display());
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Check settings that the type system lets through
    pub fn validate(&self) -> Result<()> {
        if self.tile_count == 0 {
            return Err(Error::ZeroTiles);
        }
        Ok(())
    }
}

impl Engine<Box<dyn ForkJoin + Send + Sync>> {
    /// Build an engine out of validated settings
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let executor: Box<dyn ForkJoin + Send + Sync> = match (config.backend, config.threads) {
            (Backend::Sequential, _) => Box::new(Sequential),
            (Backend::Threads, threads) => Box::new(ScopedThreads::new(
                threads.unwrap_or_else(thread::default_num_threads),
            )),
            (Backend::Rayon, None) => Box::new(Rayon),
            (Backend::Rayon, Some(num_threads)) => Box::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()?,
            ),
        };
        log::debug!("Built engine from {config:?}");
        Ok(Engine::with_executor(config.tile_count, executor)?.with_strategy(config.strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Sum;

    #[test]
    fn defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tile_count, 1024);
        assert_eq!(config.strategy, Strategy::DecoupledLookback);
        assert_eq!(config.backend, Backend::Rayon);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn full_config() {
        let config = Config::from_toml_str(
            r#"
            tile_count = 16
            strategy = "upsweep_downsweep"
            backend = "threads"
            threads = 3
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            Config {
                tile_count: 16,
                strategy: Strategy::UpsweepDownsweep,
                backend: Backend::Threads,
                threads: Some(3),
            }
        );
    }

    #[test]
    fn invalid_configs() {
        assert!(matches!(
            Config::from_toml_str("tile_count = 0"),
            Err(Error::ZeroTiles)
        ));
        assert!(matches!(
            Config::from_toml_str("tile_count = -4"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("backend = \"gpu\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("tiles = 4"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::load("/nonexistent/tilescan.toml"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn engines_from_configs() {
        for backend in [Backend::Sequential, Backend::Threads, Backend::Rayon] {
            for threads in [None, Some(2)] {
                let config = Config {
                    tile_count: 3,
                    strategy: Strategy::UpsweepDownsweep,
                    backend,
                    threads,
                };
                let engine = Engine::from_config(&config).unwrap();
                assert_eq!(engine.tile_count(), 3);
                assert_eq!(engine.strategy(), Strategy::UpsweepDownsweep);

                let mut data = [1u32; 10];
                engine.scan_in_place(&mut data, Sum);
                assert_eq!(data, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10], "{config:?}");
            }
        }
        let config = Config {
            tile_count: 0,
            ..Config::default()
        };
        assert!(matches!(Engine::from_config(&config), Err(Error::ZeroTiles)));
    }
}
