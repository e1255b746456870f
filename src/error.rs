use thiserror::Error;

use cpt_engine::EngineError;
use cpt_format::FormatError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("CPT_BIN_DIR is not set; cannot locate the engine executable")]
    MissingBinDir,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
