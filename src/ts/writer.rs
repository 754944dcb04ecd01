//! Indentation-aware text sink.

#[derive(Debug, Default)]
pub(crate) struct IndentWriter {
    out: String,
    just_wrote_newline: bool,
}

impl IndentWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Writes `s`, prefixing `indent` when the previous write ended a line.
    pub(crate) fn write(&mut self, indent: &str, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.just_wrote_newline {
            self.out.push_str(indent);
        }
        self.out.push_str(s);
        self.just_wrote_newline = s.ends_with('\n');
    }

    /// Newlines never carry indentation, so blank lines stay empty.
    pub(crate) fn newline(&mut self) {
        self.out.push('\n');
        self.just_wrote_newline = true;
    }

    pub(crate) fn ensure_newline(&mut self) {
        if !self.just_wrote_newline {
            self.newline();
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indentation_applies_after_newlines_only() {
        let mut w = IndentWriter::new();
        w.write("  ", "a");
        w.newline();
        w.newline();
        w.write("  ", "b");
        w.ensure_newline();
        w.ensure_newline();
        assert_eq!(w.finish(), "a\n\n  b\n");
    }
}
