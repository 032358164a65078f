use crate::{Position, Source};
use once_cell::unsync::OnceCell;
use std::fmt::{Display, Formatter};

impl Position {
    /// Create a new Position based on the line and column number.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl<'s> From<&'s str> for Source<'s> {
    fn from(value: &'s str) -> Self {
        Source::new(value)
    }
}

impl<'s> Source<'s> {
    pub fn new(value: &'s str) -> Self {
        Self {
            value,
            line_breaks: OnceCell::new(),
        }
    }

    pub fn obtain_line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.value
                .bytes()
                .enumerate()
                .filter_map(|(index, b)| if b == b'\n' { Some(index) } else { None })
                .collect()
        })
    }

    /// The line and column of a byte offset into the source.
    pub fn obtain_position(&self, pointer: usize) -> Position {
        let pointer = pointer.min(self.value.len());
        let line_breaks = self.obtain_line_breaks();
        let index = match line_breaks.binary_search(&pointer) {
            Ok(index) | Err(index) => index,
        };

        if index == 0 {
            Position::new(1, self.value[..pointer].chars().count() + 1)
        } else {
            let break_point = line_breaks[index - 1] + 1;
            Position::new(index + 1, self.value[break_point..pointer].chars().count() + 1)
        }
    }
}
