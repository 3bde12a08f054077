// The error architecture mirrors what worked elsewhere: a single opaque
// `Error` type wrapping a private `ErrorKind`, with one payload struct per
// kind so each failure can carry exactly the context it needs. Everything
// here is fatal for the computation unit that raised it; the caller decides
// whether to abort the whole batch or skip the unit.

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The underlying internal error type
#[non_exhaustive]
#[derive(Clone, Debug)]
enum ErrorKind {
    /// An error raised for an invalid mesh configuration (non-positive box
    /// size or grid resolution)
    InvalidConfig(InvalidConfigError),
    /// An error raised for invalid input data (empty catalogue, mismatched
    /// table lengths, or an exactly-zero normalization divisor)
    InvalidData(InvalidDataError),
    /// An error raised when two mesh fields with mismatched grid geometry
    /// are combined
    IncompatibleMeshes(IncompatibleMeshesError),
    /// An error raised when an unknown assignment-scheme name is specified
    AssignmentName(AssignmentNameError),
}

// define constructor methods for Error
impl Error {
    /// produce an error indicating an invalid mesh configuration
    pub(crate) fn invalid_config(what: String) -> Self {
        Error {
            kind: ErrorKind::InvalidConfig(InvalidConfigError { what }),
        }
    }

    /// produce an error indicating invalid input data
    pub(crate) fn invalid_data(what: String) -> Self {
        Error {
            kind: ErrorKind::InvalidData(InvalidDataError { what }),
        }
    }

    /// produce an error indicating that two mesh fields have incompatible
    /// physical properties
    pub(crate) fn incompatible_meshes() -> Self {
        Error {
            kind: ErrorKind::IncompatibleMeshes(IncompatibleMeshesError),
        }
    }

    /// produce an error indicating that an unknown assignment-scheme name
    /// was specified
    pub(crate) fn assignment_name(actual: String, choices: &'static [&'static str]) -> Self {
        Error {
            kind: ErrorKind::AssignmentName(AssignmentNameError { actual, choices }),
        }
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.kind.fmt(f)
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            ErrorKind::InvalidConfig(ref err) => err.fmt(f),
            ErrorKind::InvalidData(ref err) => err.fmt(f),
            ErrorKind::IncompatibleMeshes(ref err) => err.fmt(f),
            ErrorKind::AssignmentName(ref err) => err.fmt(f),
        }
    }
}

/// An error raised for an invalid mesh configuration
#[derive(Clone, Debug)]
struct InvalidConfigError {
    what: String,
}

impl core::fmt::Display for InvalidConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "invalid mesh configuration: {}", self.what)
    }
}

/// An error raised for invalid input data
#[derive(Clone, Debug)]
struct InvalidDataError {
    what: String,
}

impl core::fmt::Display for InvalidDataError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "invalid input data: {}", self.what)
    }
}

/// An error raised when two mesh fields with mismatched grid geometry are
/// combined
#[derive(Clone, Debug)]
struct IncompatibleMeshesError;

impl core::fmt::Display for IncompatibleMeshesError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "input mesh fields have incompatible physical properties")
    }
}

/// An error raised when an unknown assignment-scheme name is specified
#[derive(Clone, Debug)]
struct AssignmentNameError {
    actual: String,
    choices: &'static [&'static str],
}

impl core::fmt::Display for AssignmentNameError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "'{}' is not an assignment scheme. Choices include: {:?}",
            self.actual, self.choices
        )
    }
}
