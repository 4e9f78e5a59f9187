use thiserror::Error;

/// Everything that can make an engine invocation refuse to start
///
/// Once tiles have been scheduled, an invocation either completes or unwinds:
/// there is no partial result to recover.
#[derive(Debug, Error)]
pub enum Error {
    #[error("The tile count must be at least 1.")]
    ZeroTiles,

    #[error("The output holds {actual} elements, but the input holds {expected}.")]
    OutputLength { expected: usize, actual: usize },

    #[error("The output holds {available} elements, but up to {needed} may be written.")]
    OutputTooShort { needed: usize, available: usize },

    #[error("The input holds {len} elements, but at most {max} can be counted.")]
    InputTooLong { len: usize, max: usize },

    #[error("Failed to read the engine configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse the engine configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to set up the rayon thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check that an input can be indexed by the 32-bit counts of the status table
pub(crate) fn check_countable(len: usize) -> Result<()> {
    let max = u32::MAX as usize;
    if len > max {
        return Err(Error::InputTooLong { len, max });
    }
    Ok(())
}

/// Check that a compaction or segmentation output can take any result
pub(crate) fn check_worst_case_output(input_len: usize, output_len: usize) -> Result<()> {
    if output_len < input_len {
        return Err(Error::OutputTooShort {
            needed: input_len,
            available: output_len,
        });
    }
    Ok(())
}
