/// Result alias that carries the custom [`ArdError`] type.
pub type Result<T> = std::result::Result<T, ArdError>;

/// Common error type for the core crate.
///
/// Everything here is raised while a scene is being assembled. Once a
/// simulation is built, stepping only fails if the transform backend does.
#[derive(Debug, thiserror::Error)]
pub enum ArdError {
    /// Free-form message for failures without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be decoded.
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
    /// The real FFT backing the DCT rejected its buffers.
    #[error("transform failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// A grid was requested with a zero or mismatched extent.
    #[error("invalid grid dimensions {width}x{height}x{depth}: {reason}")]
    InvalidDimensions {
        width: i64,
        height: i64,
        depth: i64,
        reason: &'static str,
    },
    /// A configuration value is outside its physical range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A scene or source record could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    /// A local coordinate does not address a cell of the partition.
    #[error("cell ({x}, {y}, {z}) is outside a {width}x{height}x{depth} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        z: i64,
        width: usize,
        height: usize,
        depth: usize,
    },
}

impl ArdError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn dimensions(width: i64, height: i64, depth: i64, reason: &'static str) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            depth,
            reason,
        }
    }
}

impl From<&str> for ArdError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ArdError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
