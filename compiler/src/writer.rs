//! Line buffer with indentation for emitting Rust source.

use crate::error::CompileError;

const INDENT: &str = "    ";

#[derive(Debug, Clone, Default)]
pub struct IndentedTextWriter {
    lines:  Vec<String>,
    indent: usize,
}

impl IndentedTextWriter {
    pub fn new() -> IndentedTextWriter {
        IndentedTextWriter::default()
    }

    /// Writes `text` at the current indentation. Embedded newlines start new
    /// lines at the same indentation.
    pub fn write_line(&mut self, text: impl AsRef<str>) {
        for line in text.as_ref().split('\n') {
            if line.is_empty() {
                self.lines.push(String::new());
            } else {
                self.lines.push(format!("{}{}", INDENT.repeat(self.indent), line));
            }
        }
    }

    /// A blank line, never two in a row and never right after an opening brace.
    pub fn write_empty_line(&mut self) {
        match self.lines.last() {
            None => {}
            Some(last) if last.is_empty() || last.ends_with('{') => {}
            Some(_) => self.lines.push(String::new()),
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn unindent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Emits `opening`, the indented body and `closing`. The body is written
    /// to a child buffer and spliced in only if it succeeds, so a failed
    /// block leaves nothing behind.
    pub fn block<F>(&mut self, opening: &str, closing: &str, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut IndentedTextWriter) -> Result<(), CompileError>,
    {
        let mut child = IndentedTextWriter {
            lines:  Vec::new(),
            indent: self.indent + 1,
        };
        body(&mut child)?;
        while child.lines.last().map_or(false, |l| l.is_empty()) {
            child.lines.pop();
        }
        self.write_line(opening);
        self.lines.extend(child.lines);
        self.write_line(closing);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_string(mut self) -> String {
        while self.lines.last().map_or(false, |l| l.is_empty()) {
            self.lines.pop();
        }
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_indent() {
        let mut w = IndentedTextWriter::new();
        w.block("impl Point {", "}", |w| {
            w.block("pub fn x(&self) -> i32 {", "}", |w| {
                w.write_line("self.x");
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(
            w.into_string(),
            "impl Point {\n    pub fn x(&self) -> i32 {\n        self.x\n    }\n}\n"
        );
    }

    #[test]
    fn failed_block_writes_nothing() {
        let mut w = IndentedTextWriter::new();
        w.write_line("// header");
        let result = w.block("fn broken() {", "}", |w| {
            w.write_line("let a = 1;");
            Err(CompileError::Generate("unsupported".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(w.into_string(), "// header\n");
    }

    #[test]
    fn blank_lines_collapse() {
        let mut w = IndentedTextWriter::new();
        w.write_empty_line();
        w.write_line("a {");
        w.write_empty_line();
        w.indent();
        w.write_line("b\nc");
        w.unindent();
        w.write_empty_line();
        w.write_empty_line();
        w.write_line("}");
        assert_eq!(w.into_string(), "a {\n    b\n    c\n\n}\n");
    }
}
