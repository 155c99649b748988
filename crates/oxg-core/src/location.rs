//! Source locations for diagnostics.
//!
//! Every parsed node carries a [`Location`]: the file it came from, its JSON
//! pointer, and (for JSON inputs) the line and column of the node. Pointers
//! are built structurally while walking the document; positions come from
//! [`OffsetIndex`], which tokenizes the raw JSON text once per document.

use std::fmt;

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Where a parsed node came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub pointer: String,
    pub position: Option<Position>,
}

impl Location {
    pub fn new(file: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            pointer: pointer.into(),
            position: None,
        }
    }

    /// Root location of a document.
    pub fn root(file: impl Into<String>) -> Self {
        Self::new(file, "")
    }

    /// Location of a child node, with the key escaped per RFC 6901.
    pub fn key(&self, key: &str) -> Location {
        let mut pointer = String::with_capacity(self.pointer.len() + key.len() + 1);
        pointer.push_str(&self.pointer);
        pointer.push('/');
        for ch in key.chars() {
            match ch {
                '~' => pointer.push_str("~0"),
                '/' => pointer.push_str("~1"),
                _ => pointer.push(ch),
            }
        }
        Location {
            file: self.file.clone(),
            pointer,
            position: None,
        }
    }

    /// Location of an array element.
    pub fn index(&self, idx: usize) -> Location {
        Location {
            file: self.file.clone(),
            pointer: format!("{}/{}", self.pointer, idx),
            position: None,
        }
    }

    /// Fill in line/column from an offset index, if the index knows this node.
    pub fn positioned(mut self, index: &OffsetIndex) -> Location {
        self.position = index.position(&self.pointer);
        self
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::root("")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{}:{}:{}", self.file, pos.line, pos.column),
            None if self.pointer.is_empty() => write!(f, "{}", self.file),
            None => write!(f, "{}#{}", self.file, self.pointer),
        }
    }
}

/// Byte offsets of every pointer-addressable node in a JSON document.
///
/// Built once per JSON document by a single pass over the text. YAML inputs
/// skip this and carry pointer-only locations.
#[derive(Debug, Default)]
pub struct OffsetIndex {
    offsets: std::collections::HashMap<String, usize>,
    line_starts: Vec<usize>,
}

impl OffsetIndex {
    /// Index a JSON text. Assumes the text is valid JSON; the caller parses
    /// it with serde first, so malformed input never reaches this point.
    pub fn of_json(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        let mut scanner = Scanner {
            bytes: text.as_bytes(),
            pos: 0,
            offsets: std::collections::HashMap::new(),
        };
        scanner.value("");
        Self {
            offsets: scanner.offsets,
            line_starts,
        }
    }

    /// Line/column of the node at `pointer`, if indexed.
    pub fn position(&self, pointer: &str) -> Option<Position> {
        let offset = *self.offsets.get(pointer)?;
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some(Position {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        })
    }
}

/// Minimal JSON walker recording the byte offset of every node.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    offsets: std::collections::HashMap<String, usize>,
}

impl Scanner<'_> {
    fn value(&mut self, pointer: &str) {
        self.skip_ws();
        if self.pos >= self.bytes.len() {
            return;
        }
        self.offsets.insert(pointer.to_string(), self.pos);
        match self.bytes[self.pos] {
            b'{' => self.object(pointer),
            b'[' => self.array(pointer),
            b'"' => {
                self.string();
            }
            _ => self.scalar(),
        }
    }

    fn object(&mut self, pointer: &str) {
        self.pos += 1; // '{'
        loop {
            self.skip_ws();
            match self.bytes.get(self.pos) {
                Some(b'}') => {
                    self.pos += 1;
                    return;
                }
                Some(b'"') => {
                    let key = self.string();
                    self.skip_ws();
                    if self.bytes.get(self.pos) == Some(&b':') {
                        self.pos += 1;
                    }
                    let child = format!("{}/{}", pointer, escape_token(&key));
                    self.value(&child);
                    self.skip_ws();
                    if self.bytes.get(self.pos) == Some(&b',') {
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn array(&mut self, pointer: &str) {
        self.pos += 1; // '['
        let mut idx = 0usize;
        loop {
            self.skip_ws();
            match self.bytes.get(self.pos) {
                Some(b']') => {
                    self.pos += 1;
                    return;
                }
                Some(_) => {
                    let child = format!("{}/{}", pointer, idx);
                    self.value(&child);
                    idx += 1;
                    self.skip_ws();
                    if self.bytes.get(self.pos) == Some(&b',') {
                        self.pos += 1;
                    }
                }
                None => return,
            }
        }
    }

    fn string(&mut self) -> String {
        // self.bytes[self.pos] == b'"'
        self.pos += 1;
        let mut out = String::new();
        // Literal bytes are appended a run at a time so multibyte sequences
        // survive intact around escapes.
        let mut run = self.pos;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'"' => {
                    out.push_str(&String::from_utf8_lossy(&self.bytes[run..self.pos]));
                    self.pos += 1;
                    return out;
                }
                b'\\' => {
                    out.push_str(&String::from_utf8_lossy(&self.bytes[run..self.pos]));
                    self.pos += 1;
                    match self.bytes.get(self.pos) {
                        Some(b'n') => out.push('\n'),
                        Some(b't') => out.push('\t'),
                        Some(b'r') => out.push('\r'),
                        Some(b'u') => {
                            let hex = self
                                .bytes
                                .get(self.pos + 1..self.pos + 5)
                                .and_then(|h| std::str::from_utf8(h).ok())
                                .and_then(|h| u32::from_str_radix(h, 16).ok())
                                .and_then(char::from_u32);
                            if let Some(ch) = hex {
                                out.push(ch);
                            }
                            self.pos += 4;
                        }
                        Some(&c) => out.push(c as char),
                        None => return out,
                    }
                    self.pos += 1;
                    run = self.pos;
                }
                _ => self.pos += 1,
            }
        }
        if run < self.bytes.len() {
            out.push_str(&String::from_utf8_lossy(&self.bytes[run..]));
        }
        out
    }

    fn scalar(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r' => return,
                _ => self.pos += 1,
            }
        }
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => return,
            }
        }
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Number of context lines printed around the offending line.
pub const SNIPPET_CONTEXT: usize = 3;

/// Render a caret-annotated context window for a position within `source`.
///
/// Output is deterministic: filename header, up to ±[`SNIPPET_CONTEXT`] lines,
/// and a caret under the offending column.
pub fn fmt_snippet(file: &str, source: &str, pos: Position) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let target = pos.line.saturating_sub(1);
    let first = target.saturating_sub(SNIPPET_CONTEXT);
    let last = (target + SNIPPET_CONTEXT).min(lines.len().saturating_sub(1));
    let width = (last + 1).to_string().len();

    let mut out = format!("{}:{}:{}\n", file, pos.line, pos.column);
    for (i, line) in lines.iter().enumerate().take(last + 1).skip(first) {
        out.push_str(&format!("{:>width$} | {}\n", i + 1, line, width = width));
        if i == target {
            out.push_str(&format!(
                "{:>width$} | {}^\n",
                "",
                " ".repeat(pos.column.saturating_sub(1)),
                width = width
            ));
        }
    }
    out
}
