// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Brace-aware source writer
//!
//! Indentation follows the braces in the emitted text, so multi-line code
//! fragments from templates keep their block structure.

use std::fmt;

use crate::error::CodegenResult;

const INDENT: &str = "    ";

#[derive(Debug, Default, Clone)]
pub struct CodeStream {
    buffer: String,
    depth: usize,
}

impl CodeStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one or more lines, re-indenting each
    pub fn line(&mut self, text: &str) -> &mut Self {
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                self.buffer.push('\n');
                continue;
            }

            let opens = line.matches('{').count();
            let mut closes = line.matches('}').count();
            if line.starts_with('}') {
                self.depth = self.depth.saturating_sub(1);
                closes -= 1;
            }

            for _ in 0..self.depth {
                self.buffer.push_str(INDENT);
            }
            self.buffer.push_str(line);
            self.buffer.push('\n');

            self.depth = (self.depth + opens).saturating_sub(closes);
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.buffer.push('\n');
        self
    }

    /// `header {`, the body, then `}`
    pub fn block<F>(&mut self, header: &str, body: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{} {{", header));
        }
        body(self);
        self.line("}")
    }

    /// Like [`CodeStream::block`] for bodies that can fail
    pub fn try_block<F>(&mut self, header: &str, body: F) -> CodegenResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> CodegenResult<()>,
    {
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{} {{", header));
        }
        body(self)?;
        Ok(self.line("}"))
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Display for CodeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodegenError;

    #[test]
    fn test_indent_follows_braces() {
        let mut os = CodeStream::new();
        os.line("if (x) {")
            .line("y = 1;")
            .line("} else {")
            .line("y = 2;")
            .line("}");
        assert_eq!(os.as_str(), "if (x) {\n    y = 1;\n} else {\n    y = 2;\n}\n");
        assert_eq!(os.depth(), 0);
    }

    #[test]
    fn test_multiline_fragment_reindented() {
        let mut os = CodeStream::new();
        os.block("for (int i = 0; i < n; i++)", |os| {
            os.line("  a += 1;\n      b += 2;");
        });
        assert_eq!(
            os.as_str(),
            "for (int i = 0; i < n; i++) {\n    a += 1;\n    b += 2;\n}\n"
        );
    }

    #[test]
    fn test_try_block_propagates() {
        let mut os = CodeStream::new();
        let result = os.try_block("if (x)", |os| {
            os.line("y = 1;");
            Err(CodegenError::Unsupported {
                backend: "cuda".to_string(),
                what: "test".to_string(),
            })
        });
        assert!(matches!(result, Err(CodegenError::Unsupported { .. })));
        assert!(!os.as_str().ends_with("}\n"));
    }

    #[test]
    fn test_try_block_closes_on_success() {
        let mut os = CodeStream::new();
        os.try_block("if (x)", |os| {
            os.line("y = 1;");
            Ok(())
        })
        .unwrap();
        assert_eq!(os.as_str(), "if (x) {\n    y = 1;\n}\n");
        assert_eq!(os.depth(), 0);
    }
}
