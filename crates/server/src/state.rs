use crate::config::ServerConfig;
use crate::error::ServerResult;
use altpipe::{Pipeline, PipelineConfig};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Pipeline orchestrator (shared across requests; the only mutable state
    /// behind it is the token cache)
    pub pipeline: Arc<Pipeline>,
}

impl ServerState {
    /// Create server state with the production pipeline wired from the
    /// environment.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let pipeline_config = PipelineConfig::from_env().map_err(altpipe::PipelineError::from)?;
        let pipeline = Pipeline::new(&pipeline_config)?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create server state around an already-built pipeline. Tests use this
    /// to run the router against in-memory fakes.
    pub fn with_pipeline(config: ServerConfig, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}
