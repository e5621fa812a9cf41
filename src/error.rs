use std::error;
use std::fmt;
use std::result;

/// A type alias for dealing with errors returned by this crate.
pub type Result<T> = result::Result<T, Error>;

/// An error that occurred during the construction or deserialization of a
/// DFA.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The kind of error that occurred.
#[derive(Clone, Debug)]
pub enum ErrorKind {
    /// Subset construction reached a set of NFA states whose accept labels
    /// the ambiguity resolver could not collapse into one. The payload holds
    /// a rendering of each conflicting label.
    ///
    /// This error is fatal for the build that produced it, but the builder
    /// that started the build remains valid and may be used again.
    Ambiguity(Vec<String>),
    /// An error that occurred while serializing a DFA. The only way this can
    /// happen is if the DFA is too large to index with `u32` state
    /// identifiers.
    Serialize(String),
    /// An error that occurred while deserializing a DFA from bytes that do
    /// not describe a valid automaton.
    Deserialize(String),
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn ambiguity<L: fmt::Debug>(conflicts: &[L]) -> Error {
        let labels = conflicts.iter().map(|l| format!("{:?}", l)).collect();
        Error { kind: ErrorKind::Ambiguity(labels) }
    }

    pub(crate) fn serialize(msg: &str) -> Error {
        Error { kind: ErrorKind::Serialize(msg.to_string()) }
    }

    pub(crate) fn deserialize(msg: &str) -> Error {
        Error { kind: ErrorKind::Deserialize(msg.to_string()) }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Ambiguity(ref labels) => write!(
                f,
                "multiple patterns match the same string with conflicting \
                 labels: {}",
                labels.join(", "),
            ),
            ErrorKind::Serialize(ref msg) => {
                write!(f, "DFA serialization error: {}", msg)
            }
            ErrorKind::Deserialize(ref msg) => {
                write!(f, "DFA deserialization error: {}", msg)
            }
        }
    }
}
