#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Generic(String),
    #[error("Structurize error: {0}")]
    StructurizeError(#[from] arbor_core::arbor_structurizer::Error),
    #[error("Config error: {0}")]
    ConfigError(#[from] arbor_config::error::Error),
}
