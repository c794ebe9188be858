//! Error types for the anycore runtime

use thiserror::Error;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

/// Game/module loading errors. All of these are recoverable: the
/// session is fully unwound and the caller may retry with a different
/// path or forced module.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unrecognized system \"{0}\"")]
    UnknownModule(String),

    #[error("Unrecognized file format")]
    UnrecognizedFormat,

    #[error("Specified system \"{0}\" only supports CD loading")]
    CdOnlyModule(String),

    #[error("Specified system \"{0}\" doesn't support CDs")]
    NoCdSupport(String),

    #[error("Could not find a system that supports this CD")]
    NoCdHandler,

    #[error("Module \"{module}\" failed to load: {reason}")]
    ModuleLoad { module: String, reason: String },

    #[error("Error opening \"{path}\": {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Media (file container, playlist, disc image) errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Playlist at \"{0}\" references self")]
    PlaylistSelfReference(String),

    #[error("Playlist load recursion too deep at \"{0}\"")]
    PlaylistTooDeep(String),

    #[error("Malformed patch file: {0}")]
    BadPatch(String),

    #[error("Unsupported disc image \"{0}\"")]
    UnsupportedDisc(String),

    #[error("Sector {lba} out of range")]
    SectorOutOfRange { lba: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Save-state serialization errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Section \"{0}\" not found")]
    MissingSection(String),

    #[error("Field \"{0}\" has wrong size (expected {1}, got {2})")]
    FieldSize(String, usize, usize),

    #[error("Truncated state data")]
    Truncated,

    #[error("Module rejected state: {0}")]
    ModuleReject(String),
}

/// Recording sink errors. Write failures are recoverable at the
/// session level: the sink is detached and emulation continues.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording already finalized")]
    Finalized,
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::UnknownModule("pce".to_string());
        assert_eq!(format!("{}", err), "Unrecognized system \"pce\"");

        let err = MediaError::PlaylistTooDeep("set.m3u".to_string());
        assert_eq!(
            format!("{}", err),
            "Playlist load recursion too deep at \"set.m3u\""
        );
    }

    #[test]
    fn test_error_conversion() {
        let load_err = LoadError::UnrecognizedFormat;
        let core_err: CoreError = load_err.into();
        assert!(matches!(core_err, CoreError::Load(_)));
    }
}
