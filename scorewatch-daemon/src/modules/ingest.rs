//! Ingest module initialization.
//!
//! Converts `ScorewatchConfig` into an `IngestConfig`, assembles the
//! pipeline with the passthrough collaborators, and returns it as a
//! registrable plugin.

use anyhow::Result;

use scorewatch_core::config::ScorewatchConfig;
use scorewatch_core::plugin::DynPlugin;
use scorewatch_ingest::{FileOffsetStore, IngestConfig, IngestPipelineBuilder, RegexMarkers};

use super::passthrough::{LoggingHandler, PassthroughParser};

/// Initialize the ingest module.
///
/// Returns `None` if ingest is disabled in configuration.
pub fn init(config: &ScorewatchConfig) -> Result<Option<Box<dyn DynPlugin>>> {
    if !config.ingest.enabled {
        tracing::info!("ingest disabled in configuration");
        return Ok(None);
    }

    tracing::info!(
        sources = config.ingest.watch_paths.len(),
        "initializing ingest pipeline"
    );

    let ingest_config = IngestConfig::from_core(config);
    let markers = RegexMarkers::from_config(&ingest_config)
        .map_err(|e| anyhow::anyhow!("invalid marker patterns: {}", e))?;
    let store = FileOffsetStore::new(&ingest_config.state_dir);

    let pipeline = IngestPipelineBuilder::new()
        .config(ingest_config)
        .parser(PassthroughParser)
        .handler(LoggingHandler::default())
        .markers(markers)
        .offset_store(store)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build ingest pipeline: {}", e))?;

    Ok(Some(Box::new(pipeline)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_ingest_returns_none() {
        let mut config = ScorewatchConfig::default();
        config.ingest.enabled = false;
        assert!(init(&config).unwrap().is_none());
    }

    #[test]
    fn enabled_ingest_builds_plugin() {
        let config = ScorewatchConfig::default();
        let plugin = init(&config).unwrap().expect("plugin expected");
        assert_eq!(plugin.info().name, "ingest");
    }
}
