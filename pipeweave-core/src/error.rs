use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::GraphError;
use crate::generator::GeneratorError;
use crate::grouping::GroupingError;
use crate::source::SourceError;

/// Any failure of a compile pass
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("Failed to write compiled graph: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
