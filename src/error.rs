use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised to the caller of the extraction engine.
///
/// Only configuration problems are fatal. Per-file problems (unreadable files,
/// missing controllers, missing symbols) never show up here; they are logged and
/// encoded in the affected record instead.
#[derive(Debug)]
pub enum Error {
    /// The framework tag is not one of the supported families
    UnsupportedFramework(String),
    /// The root directory handed to the engine is unusable
    InvalidRoot(PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnsupportedFramework(tag) => write!(
                f,
                "Unsupported framework type '{}'. Use 'nodejs' or 'django'.",
                tag
            ),
            Error::InvalidRoot(path) => {
                write!(f, "Project path is not a directory: {}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {}
