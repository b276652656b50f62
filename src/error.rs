/// Errors surfaced by map loading.
///
/// The tick pipeline itself never fails; only the loaders return these.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum MapError {
    Io(io::Error),
    /// A line that could not be understood, 1-based.
    Parse { line: usize, message: String },
    /// No game-layer rows.
    Empty,
    /// A directive pointed outside the grid.
    OutOfRange { line: usize, x: usize, y: usize },
}

impl MapError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        MapError::Parse { line, message: message.into() }
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io(e) => write!(f, "I/O error: {e}"),
            MapError::Parse { line, message } => write!(f, "line {line}: {message}"),
            MapError::Empty => write!(f, "map has no rows"),
            MapError::OutOfRange { line, x, y } => {
                write!(f, "line {line}: cell {x},{y} is outside the map")
            }
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MapError {
    fn from(e: io::Error) -> Self {
        MapError::Io(e)
    }
}
