use thiserror::Error;

/// Errors that abort a trace or a write.
///
/// Local problems inside the pipeline (a degenerate outline, a fit that
/// will not converge, a writer that has to approximate curves) are not
/// errors: they are reported through [`crate::Diagnostics`] and the run
/// carries on.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    #[error("invalid bitmap: {0}")]
    InvalidBitmap(String),

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("trace cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for TraceError {
    fn from(err: image::ImageError) -> Self {
        TraceError::ImageLoad(err.to_string())
    }
}
