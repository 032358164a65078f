use crate::{Error, ErrorKind, Position, Report};
use std::fmt::{Display, Formatter};

impl Error {
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            position: None,
            path: None,
            snippet: None,
        }
    }

    pub fn syntax(message: String, position: Position) -> Self {
        Error::new(ErrorKind::Syntax, message).at(position)
    }

    pub fn not_found(prefix: &str) -> Self {
        Error::new(
            ErrorKind::NotFound,
            format!("$.{} could not be found in the datastructure", prefix),
        )
    }

    pub fn type_mismatch(prefix: &str, expected: &str, actual: &str) -> Self {
        Error::new(
            ErrorKind::TypeMismatch,
            format!("$.{} is a {}; expected a {}", prefix, actual, expected),
        )
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn in_path(mut self, path: String) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.snippet = Some(snippet);
        self
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.path, &self.position) {
            (Some(path), _) => write!(f, "$.{}: {}", path, self.message)?,
            (None, Some(position)) => write!(f, "{}: {}", position, self.message)?,
            (None, None) => write!(f, "{}", self.message)?,
        }
        if let Some(snippet) = &self.snippet {
            write!(f, "\n    {}", snippet)?;
        }
        Ok(())
    }
}

impl From<Error> for Report {
    fn from(error: Error) -> Self {
        let mut report = Report::new();
        report.push(error);
        report
    }
}

impl Report {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = Error>) {
        self.errors.extend(errors);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Sort by document path, then by source position.
    pub fn sort(&mut self) {
        self.errors.sort_by(|a, b| {
            (a.path.as_deref(), a.position.map(|p| (p.line, p.column)))
                .cmp(&(b.path.as_deref(), b.position.map(|p| (p.line, p.column))))
        });
    }

    /// Turn an empty report into `Ok`.
    pub fn into_result(self) -> Result<(), Report> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} error(s) detected:", self.errors.len())?;
        for error in &self.errors {
            writeln!(f, " - {}", error)?;
        }
        Ok(())
    }
}
