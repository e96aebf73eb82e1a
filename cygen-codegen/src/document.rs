// Structured output assembly: lines carry an explicit indentation level and
// are rendered once at the end, so tests can assert structure without
// caring about whitespace mechanics.

/// Fixed banner prefixed to every generated file.
pub const AUTOGEN_WARNING: &str = "\
################################################
#                 WARNING!                     #
# This file has been auto-generated by cygen.  #
# Do not modify!!!                             #
#                                              #
#                                              #
#                    Come on, guys. I mean it! #
################################################";

const INDENT_UNIT: usize = 4;

/// An ordered list of (indent level, text) lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    lines: Vec<(usize, String)>,
}

impl Block {
    pub fn new() -> Self {
        Block::default()
    }

    /// Append one line at the given indent level.
    pub fn line(&mut self, indent: usize, text: impl Into<String>) {
        self.lines.push((indent, text.into()));
    }

    /// Append several lines at the same indent level.
    pub fn lines<S: AsRef<str>>(&mut self, indent: usize, texts: &[S]) {
        for t in texts {
            self.lines.push((indent, t.as_ref().to_string()));
        }
    }

    /// Append an empty separator line.
    pub fn blank(&mut self) {
        self.lines.push((0, String::new()));
    }

    /// Append another block, shifting all its lines by `indent` levels.
    pub fn merge(&mut self, indent: usize, other: Block) {
        for (ind, text) in other.lines {
            self.lines.push((ind + indent, text));
        }
    }

    /// Iterate the raw (indent, text) pairs. Used by tests that assert on
    /// structure rather than rendered text.
    pub fn iter(&self) -> impl Iterator<Item = &(usize, String)> {
        self.lines.iter()
    }

    /// Render with four spaces per indent level. Blank lines stay empty.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.lines.len() * 32);
        for (indent, text) in &self.lines {
            if text.is_empty() {
                out.push('\n');
                continue;
            }
            for _ in 0..(indent * INDENT_UNIT) {
                out.push(' ');
            }
            out.push_str(text);
            out.push('\n');
        }
        out
    }
}

/// Join non-empty sections with blank lines, the way module files assemble
/// as banner / imports / body / extra.
pub fn join_sections(sections: &[&str]) -> String {
    let nonempty: Vec<&str> = sections
        .iter()
        .map(|s| s.trim_end_matches('\n'))
        .filter(|s| !s.trim().is_empty())
        .collect();
    let mut out = nonempty.join("\n\n");
    out.push('\n');
    out
}
