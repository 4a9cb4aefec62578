//! Temp-file spooling and stream length delivery.
//!
//! SQLite needs a byte count before a BLOB can be written, but callers hand
//! the store streams of unknown length. The [`LengthMode`] setting decides
//! how that gap is bridged:
//!
//! | Mode | Wire behavior |
//! |---|---|
//! | `tempFile` (default) | Copy the stream to a scratch file first, then bind with the file's exact length. Works for any payload size. |
//! | `-1` | Declare the length unknown; the driver buffers the stream to EOF. |
//! | `max` | Declare the maximum length; the driver buffers the stream to EOF. |
//!
//! A [`SpoolFile`] owns its scratch file; the file is removed when the value
//! is dropped, whether the enclosing operation succeeded or not.

use std::io::{self, Read, Seek, SeekFrom};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

// =============================================================================
// Length delivery strategy
// =============================================================================

/// How a stream's length is presented to the database driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthMode {
    /// Spool to a scratch file to learn the exact length. The safe default.
    #[default]
    TempFile,
    /// Bind with length `-1`; the driver reads to EOF.
    Unknown,
    /// Bind with the maximum declarable length; the driver reads to EOF.
    Max,
}

impl LengthMode {
    /// Parses the configuration name of a mode.
    ///
    /// # Errors
    ///
    /// Any name other than `tempFile`, `-1` or `max` is a configuration
    /// error.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "tempFile" => Ok(Self::TempFile),
            "-1" => Ok(Self::Unknown),
            "max" => Ok(Self::Max),
            other => Err(Error::Config(format!(
                "unsupported stream store mechanism '{other}', supported are: tempFile, -1, max"
            ))),
        }
    }

    /// The configuration name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TempFile => "tempFile",
            Self::Unknown => "-1",
            Self::Max => "max",
        }
    }
}

// =============================================================================
// Spool file
// =============================================================================

/// A fully written scratch file, rewound and ready for sequential reading.
///
/// Deleted from disk on drop.
pub(crate) struct SpoolFile {
    file: NamedTempFile,
    length: u64,
}

impl SpoolFile {
    /// Exact byte length of the spooled payload.
    pub(crate) fn length(&self) -> u64 {
        self.length
    }
}

impl Read for SpoolFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.as_file_mut().read(buf)
    }
}

/// Copies `src` to EOF into a fresh scratch file and rewinds it.
///
/// The source is fully consumed; for a digest-teed source this finalises
/// the digest as a side effect.
pub(crate) fn spool_to_temp(src: &mut impl Read) -> Result<SpoolFile> {
    let mut file = tempfile::Builder::new().prefix("blobrec").tempfile()?;
    let length = io::copy(src, file.as_file_mut())?;
    file.as_file_mut().seek(SeekFrom::Start(0))?;
    Ok(SpoolFile { file, length })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_modes() {
        assert_eq!(LengthMode::parse("tempFile").unwrap(), LengthMode::TempFile);
        assert_eq!(LengthMode::parse("-1").unwrap(), LengthMode::Unknown);
        assert_eq!(LengthMode::parse("max").unwrap(), LengthMode::Max);
        assert_eq!(LengthMode::default(), LengthMode::TempFile);
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        let err = LengthMode::parse("mmap").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("mmap"));
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [LengthMode::TempFile, LengthMode::Unknown, LengthMode::Max] {
            assert_eq!(LengthMode::parse(mode.as_str()).unwrap(), mode);
        }
    }

    #[test]
    fn spool_copies_and_rewinds() {
        let payload = b"spool me".to_vec();
        let mut spool = spool_to_temp(&mut payload.as_slice()).unwrap();
        assert_eq!(spool.length(), payload.len() as u64);

        let mut back = Vec::new();
        spool.read_to_end(&mut back).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn spool_of_empty_stream() {
        let mut spool = spool_to_temp(&mut std::io::empty()).unwrap();
        assert_eq!(spool.length(), 0);
        let mut back = Vec::new();
        spool.read_to_end(&mut back).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn scratch_file_removed_on_drop() {
        let payload = b"transient".to_vec();
        let spool = spool_to_temp(&mut payload.as_slice()).unwrap();
        let path = spool.file.path().to_path_buf();
        assert!(path.exists());
        drop(spool);
        assert!(!path.exists());
    }
}
