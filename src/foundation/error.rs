pub type FramepackResult<T> = Result<T, FramepackError>;

#[derive(thiserror::Error, Debug)]
pub enum FramepackError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramepackError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// `true` when the underlying failure means the target medium has no room left.
    ///
    /// Looks through `anyhow` context chains so wrapped I/O errors classify the same way.
    pub fn is_resource_exhaustion(&self) -> bool {
        match self {
            Self::Io(e) => io_is_exhaustion(e),
            Self::Other(e) => e
                .chain()
                .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
                .any(io_is_exhaustion),
            _ => false,
        }
    }
}

fn io_is_exhaustion(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    // ENOSPC / EDQUOT on unix hosts.
    const ENOSPC: i32 = 28;
    const EDQUOT: i32 = 122;

    matches!(e.kind(), ErrorKind::StorageFull | ErrorKind::FileTooLarge)
        || matches!(e.raw_os_error(), Some(ENOSPC) | Some(EDQUOT))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
