use std::fmt::{Display, Formatter};

pub type DendroResult<T> = Result<T, DendroError>;

/// Failure classes that abort a command, each with its own process exit code.
///
/// Per-entity problems (an unparseable tree id, a short series) never become a
/// `DendroError`; they go to the exclusion log and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DendroErrorCategory {
    /// Malformed configuration, CLI usage, or a bad cell in an input table.
    Input,
    /// A file could not be opened, read, or written.
    Io,
    /// A numerical stage failed as a whole, such as a singular model fit.
    Computation,
    Internal,
}

impl DendroErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Input => 2,
            Self::Io => 3,
            Self::Computation => 4,
            Self::Internal => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Io => "io",
            Self::Computation => "computation",
            Self::Internal => "internal",
        }
    }
}

impl Display for DendroErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A fatal error with a stable placeholder such as `CONFIG.PARSE`, so that
/// scripts can match on the diagnostic without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{category} error [{placeholder}] {message}")]
pub struct DendroError {
    category: DendroErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl DendroError {
    pub fn new(
        category: DendroErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DendroErrorCategory::Input, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DendroErrorCategory::Io, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DendroErrorCategory::Computation, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DendroErrorCategory::Internal, placeholder, message)
    }

    pub const fn category(&self) -> DendroErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// First stderr line of a failed command.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    /// Last stderr line of a failed command.
    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}
