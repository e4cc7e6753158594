//! Fixture parser
//!
//! A fixture file is JavaScript interleaved with `/* OUTPUT ... */` comments.
//! Every tagged comment closes one test block: the code written since the
//! previous tag is what runs, and the comment body is the console output it
//! has to produce.
//!
//! Scanning is lexical. String, template and regular-expression literals and
//! ordinary comments are skipped, so a tag spelled inside any of them is not a
//! block boundary.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{HarnessError, ParseError};

/// Words after which a `/` starts a regular-expression literal
const REGEX_PREFIX_KEYWORDS: &[&[u8]] = &[
    b"return",
    b"typeof",
    b"instanceof",
    b"in",
    b"of",
    b"new",
    b"delete",
    b"void",
    b"throw",
    b"case",
    b"do",
    b"else",
    b"yield",
    b"await",
];

/// How a block's expected output is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// `/* OUTPUT`: exact line-by-line match
    Strict,
    /// `/* OUTPUT-FIXED`: match after the configured per-line rewrites
    Fixed,
    /// `/* OUTPUT-DISABLED`: never compared
    Disabled,
}

impl OutputMode {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Strict => "OUTPUT",
            Self::Fixed => "OUTPUT-FIXED",
            Self::Disabled => "OUTPUT-DISABLED",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One snippet of source plus the console output it must produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestBlock {
    /// First `// Index: N` marker in the code, else the block's ordinal
    pub index: u64,
    /// Position of the block in its file, from 0
    pub ordinal: usize,
    /// 1-based line of the OUTPUT tag
    pub line: usize,
    #[serde(skip)]
    pub code: String,
    pub expected: Vec<String>,
    pub mode: OutputMode,
    /// Text following the tag on its own line
    pub label: Option<String>,
}

impl TestBlock {
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("Index {} ({})", self.index, label),
            None => format!("Index {}", self.index),
        }
    }
}

/// A parsed fixture file. Blocks are shared read-only between runs.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub blocks: Vec<Arc<TestBlock>>,
}

impl SourceFile {
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, ParseError> {
        let path = path.into();
        let blocks = parse_blocks(text)?;
        tracing::debug!(file = %path.display(), blocks = blocks.len(), "parsed fixture file");
        Ok(Self {
            path,
            blocks: blocks.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(path, &text).map_err(|source| HarnessError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Split fixture text into its test blocks, in file order
pub fn parse_blocks(text: &str) -> Result<Vec<TestBlock>, ParseError> {
    Scanner::new(text).run()
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    regex_allowed: bool,
    block_start: usize,
    block_start_line: usize,
    last_index: Option<u64>,
    blocks: Vec<TestBlock>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
            regex_allowed: true,
            block_start: 0,
            block_start_line: 1,
            last_index: None,
            blocks: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<TestBlock>, ParseError> {
        while let Some(b) = self.peek(0) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'/' => match self.peek(1) {
                    Some(b'/') => self.skip_line_comment(),
                    Some(b'*') => self.block_comment()?,
                    _ if self.regex_allowed => self.skip_regex(),
                    _ => {
                        self.pos += 1;
                        self.regex_allowed = true;
                    }
                },
                b'\'' | b'"' => self.skip_string(b),
                b'`' => self.skip_template(),
                b')' | b']' => {
                    self.pos += 1;
                    self.regex_allowed = false;
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b if is_word_byte(b) => self.skip_word(),
                _ => {
                    self.pos += 1;
                    self.regex_allowed = true;
                }
            }
        }
        self.finish()
    }

    fn finish(self) -> Result<Vec<TestBlock>, ParseError> {
        let trailing = &self.text[self.block_start..];
        let has_code = trailing.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with("//")
        });
        if has_code {
            tracing::warn!(
                line = self.block_start_line,
                "code after the last OUTPUT block belongs to no test and is ignored"
            );
        }
        Ok(self.blocks)
    }

    fn skip_word(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(is_word_byte) {
            self.pos += 1;
        }
        let word = &self.bytes[start..self.pos];
        self.regex_allowed =
            !word[0].is_ascii_digit() && REGEX_PREFIX_KEYWORDS.contains(&word);
    }

    fn skip_line_comment(&mut self) {
        while self.peek(0).is_some_and(|b| b != b'\n') {
            self.pos += 1;
        }
    }

    /// Skip a backslash escape, keeping the line count when it escapes a newline
    fn skip_escape(&mut self) {
        if self.peek(1) == Some(b'\n') {
            self.line += 1;
        }
        self.pos += 2;
    }

    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.skip_escape(),
                b'\n' => break,
                _ if b == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.regex_allowed = false;
    }

    fn skip_template(&mut self) {
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.skip_escape(),
                b'`' => {
                    self.pos += 1;
                    break;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.skip_substitution();
                }
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        self.regex_allowed = false;
    }

    /// Skip a `${ ... }` body up to its matching brace
    fn skip_substitution(&mut self) {
        let mut depth = 1usize;
        while let Some(b) = self.peek(0) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                b'\'' | b'"' => {
                    self.skip_string(b);
                    continue;
                }
                b'`' => {
                    self.skip_template();
                    continue;
                }
                b'\n' => self.line += 1,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => {
                    if self.peek(1) == Some(b'\n') {
                        break;
                    }
                    self.pos += 2;
                    continue;
                }
                b'\n' => break,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            self.pos += 1;
        }
        while self.peek(0).is_some_and(is_word_byte) {
            self.pos += 1;
        }
        self.regex_allowed = false;
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        match detect_tag(&self.bytes[start + 2..], self.line)? {
            Some((mode, tag_len)) => self.output_block(start, start + 2 + tag_len, mode),
            None => {
                let close = find(self.bytes, b"*/", start + 2)
                    .ok_or(ParseError::UnterminatedComment { line: self.line })?;
                self.line += count_newlines(&self.bytes[start..close]);
                self.pos = close + 2;
                Ok(())
            }
        }
    }

    fn output_block(&mut self, start: usize, body_start: usize, mode: OutputMode) -> Result<(), ParseError> {
        let tag_line = self.line;
        let close = find_output_close(self.bytes, body_start)
            .ok_or(ParseError::UnterminatedOutput { line: tag_line })?;
        let text = self.text;
        let (label, expected) = split_body(&text[body_start..close]);
        let code = &text[self.block_start..start];
        let index = self.block_index(code)?;

        let block = TestBlock {
            index,
            ordinal: self.blocks.len(),
            line: tag_line,
            code: code.to_string(),
            expected,
            mode,
            label,
        };
        tracing::debug!(
            index = block.index,
            line = block.line,
            mode = %block.mode,
            expected_lines = block.expected.len(),
            "parsed block"
        );
        self.blocks.push(block);

        self.line += count_newlines(&self.bytes[start..close]);
        self.pos = close + 2;
        self.block_start = self.pos;
        self.block_start_line = self.line;
        self.regex_allowed = true;
        Ok(())
    }

    /// Check the block's `// Index:` markers and pick its index
    fn block_index(&mut self, code: &str) -> Result<u64, ParseError> {
        let mut first = None;
        for (offset, line) in code.lines().enumerate() {
            let Some(found) = index_marker(line) else {
                continue;
            };
            if let Some(previous) = self.last_index {
                if found != 0 && found <= previous {
                    return Err(ParseError::NonMonotonicIndex {
                        line: self.block_start_line + offset,
                        previous,
                        found,
                    });
                }
            }
            self.last_index = Some(found);
            first.get_or_insert(found);
        }
        Ok(first.unwrap_or(self.blocks.len() as u64))
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

fn find(bytes: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Recognize an OUTPUT tag at the start of a block comment body
/// (`rest` begins right after `/*`). Returns the mode and the tag length.
fn detect_tag(rest: &[u8], line: usize) -> Result<Option<(OutputMode, usize)>, ParseError> {
    let mut i = 0;
    while rest.get(i).is_some_and(|&b| b == b' ' || b == b'\t') {
        i += 1;
    }
    if !rest[i..].starts_with(b"OUTPUT") {
        return Ok(None);
    }
    i += b"OUTPUT".len();
    match rest.get(i) {
        Some(b'-') => {
            let keyword_start = i + 1;
            let mut end = keyword_start;
            while rest.get(end).is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_') {
                end += 1;
            }
            let mode = match &rest[keyword_start..end] {
                b"FIXED" => OutputMode::Fixed,
                b"DISABLED" => OutputMode::Disabled,
                other => {
                    return Err(ParseError::UnknownMode {
                        line,
                        tag: format!("OUTPUT-{}", String::from_utf8_lossy(other)),
                    });
                }
            };
            Ok(Some((mode, end)))
        }
        Some(&b) if b.is_ascii_alphanumeric() || b == b'_' => Ok(None),
        _ => Ok(Some((OutputMode::Strict, i))),
    }
}

/// Find the `*/` closing an OUTPUT block: one on the tag line, or the first
/// one that starts its own line. Falls back to the first `*/` at all.
fn find_output_close(bytes: &[u8], body_start: usize) -> Option<usize> {
    let first = find(bytes, b"*/", body_start)?;
    let mut candidate = Some(first);
    while let Some(close) = candidate {
        let before = &bytes[body_start..close];
        match before.iter().rposition(|&b| b == b'\n') {
            None => return Some(close),
            Some(newline) => {
                if before[newline + 1..].iter().all(|b| b.is_ascii_whitespace()) {
                    return Some(close);
                }
            }
        }
        candidate = find(bytes, b"*/", close + 2);
    }
    Some(first)
}

/// Split an OUTPUT body into the tag-line label and the expected lines.
/// Leading and trailing blank lines are dropped; inner ones are kept.
fn split_body(body: &str) -> (Option<String>, Vec<String>) {
    let mut lines = body
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));
    let label = lines
        .next()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string);
    let mut expected: Vec<String> = lines.map(str::to_string).collect();
    while expected.last().is_some_and(|line| line.trim().is_empty()) {
        expected.pop();
    }
    let leading = expected
        .iter()
        .take_while(|line| line.trim().is_empty())
        .count();
    expected.drain(..leading);
    (label, expected)
}

/// `// Index: N` marker value on a code line
fn index_marker(line: &str) -> Option<u64> {
    let comment = line.trim().strip_prefix("//")?;
    let number = comment.trim_start().strip_prefix("Index:")?;
    number.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_in_order() {
        let text = "\
// Index: 0
console.log(1);
/* OUTPUT
1
*/

// Index: 1
console.log('a');
console.log('');
console.log('b');
/* OUTPUT-FIXED node
a

b
*/
// Index: 2
f();
/* OUTPUT-DISABLED
nothing
*/
";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 3);

        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].line, 3);
        assert_eq!(blocks[0].code, "// Index: 0\nconsole.log(1);\n");
        assert_eq!(blocks[0].expected, vec!["1"]);
        assert_eq!(blocks[0].mode, OutputMode::Strict);
        assert_eq!(blocks[0].label, None);

        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[1].mode, OutputMode::Fixed);
        assert_eq!(blocks[1].label.as_deref(), Some("node"));
        assert_eq!(blocks[1].expected, vec!["a", "", "b"]);
        assert!(blocks[1].code.starts_with("\n\n// Index: 1\n"));

        assert_eq!(blocks[2].mode, OutputMode::Disabled);
        assert_eq!(blocks[2].ordinal, 2);
        assert_eq!(blocks[2].line, 18);
    }

    #[test]
    fn test_tags_inside_literals_are_ignored() {
        let text = "\
var s = '/* OUTPUT';
var t = `x ${ '/* OUTPUT' } /* OUTPUT`;
var r = /\\/* OUTPUT/g;
/* a plain comment mentioning OUTPUT */
/* OUTPUTS are described below */
// /* OUTPUT
console.log(s);
/* OUTPUT
/* OUTPUT
*/
";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].expected, vec!["/* OUTPUT"]);
        assert_eq!(blocks[0].line, 8);
    }

    #[test]
    fn test_division_is_not_a_regex() {
        let text = "var a = 4 / 2; var b = (a) / 2 /* OUTPUT */;\nconsole.log(a / b);\n/* OUTPUT\n2\n*/\n";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].expected.is_empty());
        assert_eq!(blocks[1].expected, vec!["2"]);
    }

    #[test]
    fn test_index_markers() {
        let text = "\
// Index: 3
a();
// Index: 20
b();
/* OUTPUT
*/
c();
/* OUTPUT
*/
// Index: 0
d();
/* OUTPUT
*/
";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks[0].index, 3);
        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[2].index, 0);

        let err = parse_blocks("// Index: 4\n/* OUTPUT\n*/\n\n// Index: 2\n/* OUTPUT\n*/\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::NonMonotonicIndex {
                line: 5,
                previous: 4,
                found: 2
            }
        );
    }

    #[test]
    fn test_malformed_blocks() {
        let err = parse_blocks("a();\n\n/* OUTPUT\n1\n").unwrap_err();
        assert_eq!(err, ParseError::UnterminatedOutput { line: 3 });

        let err = parse_blocks("a();\n/* OUTPUT-LATER\n1\n*/\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownMode {
                line: 2,
                tag: "OUTPUT-LATER".to_string()
            }
        );

        let err = parse_blocks("a();\n/* OUTPUT\n*/\nb();\n/* never closed\n").unwrap_err();
        assert_eq!(err, ParseError::UnterminatedComment { line: 5 });
    }

    #[test]
    fn test_inline_close_and_crlf() {
        let blocks = parse_blocks("x();\r\n/* OUTPUT\r\n1 */2\r\n*/\r\n").unwrap();
        assert_eq!(blocks[0].expected, vec!["1 */2"]);

        let blocks = parse_blocks("x(); /* OUTPUT */").unwrap();
        assert!(blocks[0].expected.is_empty());
        assert_eq!(blocks[0].code, "x(); ");
    }

    #[test]
    fn test_trailing_code_is_dropped() {
        let blocks = parse_blocks("a();\n/* OUTPUT\n*/\nb();\n").unwrap();
        assert_eq!(blocks.len(), 1);
    }
}
