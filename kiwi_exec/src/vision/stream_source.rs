//! [`FrameSource`] reading detections produced by an external marker detector
//!
//! The detector writes one JSON array of [`MarkerObservation`]s per line, one line per processed
//! camera frame, into a file or named pipe.
//!
//! A stream created on a path opens it lazily, so the detector may be started after the
//! executable. Until the path can be read the self-test fails, which holds the behaviour manager
//! in `Init`. A regular file is followed as it grows. A named pipe is reopened when the detector
//! closes it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use super::{FrameSource, VisionError};
use comms_if::eqpt::vision::MarkerObservation;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct DetectionStream<R> {
    /// Path the reader is (re)opened from, `None` for a stream built on a reader
    path: Option<PathBuf>,

    reader: Option<R>,

    open: fn(&Path) -> io::Result<R>,

    line: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DetectionStream<BufReader<File>> {
    /// Create a stream on the given file or named pipe. The path is not opened until the stream
    /// is first tested or read.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            reader: None,
            open: open_file,
            line: String::new(),
        }
    }
}

impl<R: BufRead> DetectionStream<R> {
    /// Create a stream on an already open reader. The end of the reader closes the stream.
    pub fn new(reader: R) -> Self {
        Self {
            path: None,
            reader: Some(reader),
            open: no_reopen,
            line: String::new(),
        }
    }

    /// Open the reader if it isn't already.
    fn ensure_open(&mut self) -> Result<&mut R, VisionError> {
        if self.reader.is_none() {
            let path = self.path.as_ref().ok_or(VisionError::SourceClosed)?;
            let reader = (self.open)(path).map_err(VisionError::OpenError)?;
            info!("Detection stream {:?} opened", path);
            self.reader = Some(reader);
        }

        self.reader.as_mut().ok_or(VisionError::SourceClosed)
    }

    /// Handle the end of the reader.
    fn end_of_stream(&mut self) -> VisionError {
        match &self.path {
            // The writer of a pipe has gone, reopen on the next acquisition
            Some(p) if is_fifo(p) => {
                debug!("Detection pipe {:?} closed by the detector", p);
                self.reader = None;
                VisionError::NoNewFrame
            }
            // Follow the file as the detector appends to it
            Some(_) => VisionError::NoNewFrame,
            None => VisionError::SourceClosed,
        }
    }
}

impl<R: BufRead + Send + 'static> FrameSource for DetectionStream<R> {
    fn acquire(&mut self) -> Result<Vec<MarkerObservation>, VisionError> {
        loop {
            self.line.clear();

            if self.reader.is_none() {
                self.ensure_open()?;
            }

            let read = match self.reader.as_mut() {
                Some(r) => r.read_line(&mut self.line).map_err(VisionError::ReadError)?,
                None => return Err(VisionError::SourceClosed),
            };

            if read == 0 {
                return Err(self.end_of_stream());
            }

            // Blank lines are keep-alives from the detector
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return serde_json::from_str(trimmed).map_err(VisionError::ParseError);
        }
    }

    /// Passes once a frame is waiting to be read. Opening a named pipe blocks until the detector
    /// opens it for writing, so for a pipe it is enough that it exists.
    fn self_test(&mut self) -> bool {
        if self.reader.is_none() {
            if let Some(p) = &self.path {
                match fs::metadata(p) {
                    Ok(_) if is_fifo(p) => return true,
                    Ok(_) => (),
                    Err(e) => {
                        warn!("Detection stream {:?} is not available: {}", p, e);
                        return false;
                    }
                }
            }
        }

        let reader = match self.ensure_open() {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not open the detection stream: {}", e);
                return false;
            }
        };

        match reader.fill_buf() {
            Ok(buf) if !buf.is_empty() => true,
            Ok(_) => {
                warn!("Detection stream is empty, is the detector running?");
                false
            }
            Err(e) => {
                warn!("Could not read the detection stream: {}", e);
                false
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn open_file(path: &Path) -> io::Result<BufReader<File>> {
    File::open(path).map(BufReader::new)
}

fn no_reopen<R>(_path: &Path) -> io::Result<R> {
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "the stream has no path to reopen",
    ))
}

#[cfg(unix)]
fn is_fifo(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;

    fs::metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_fifo(_path: &Path) -> bool {
    false
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
