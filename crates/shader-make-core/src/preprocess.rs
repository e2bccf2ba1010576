//! Conditional blocks of config files.
//!
//! Config files support a tiny subset of the C preprocessor: `#ifdef NAME`, `#if 1`, `#if 0`,
//! `#else` and `#endif`. `NAME` is tested against the global defines of the build. Lines
//! starting with `//` are comments.
//!
//! A directive is recognized anywhere in a line, so `#endif // lighting` closes a block. The
//! first directive found in the order above decides the kind of the line.

use crate::options::Options;

/// What a config line is, once leading and trailing whitespace is trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigLineKind<'line> {
    /// Empty or a `//` comment.
    Blank,
    /// `#ifdef NAME`.
    IfDef(&'line str),
    /// `#if 1`.
    IfOne,
    /// `#if 0`.
    IfZero,
    /// `#else`.
    Else,
    /// `#endif`.
    EndIf,
    /// Anything else: a shader description, possibly with brace groups.
    Content(&'line str),
}

impl<'line> ConfigLineKind<'line> {
    /// Classifies one line of a config file.
    #[inline]
    #[must_use]
    pub fn classify(line: &'line str) -> Self {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Self::Blank;
        }
        if let Some((_, name)) = line.split_once("#ifdef") {
            return Self::IfDef(name.split_whitespace().next().unwrap_or_default());
        }
        if line.contains("#if 1") {
            Self::IfOne
        } else if line.contains("#if 0") {
            Self::IfZero
        } else if line.contains("#endif") {
            Self::EndIf
        } else if line.contains("#else") {
            Self::Else
        } else {
            Self::Content(line)
        }
    }
}

/// A directive that doesn't match any open block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BlockError {
    /// `#endif` without an open block.
    #[error("unexpected '#endif'")]
    UnexpectedEndIf,
    /// `#else` without an open block.
    #[error("unexpected '#else'")]
    UnexpectedElse,
}

/// Stack of nested conditional blocks.
///
/// Each entry is whether lines at that depth are active, taking every enclosing block into
/// account. The bottom entry is the always-active top level of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStack(Vec<bool>);

impl Default for BlockStack {
    #[inline]
    fn default() -> Self {
        Self(vec![true])
    }
}

impl BlockStack {
    /// Whether lines at the current depth are processed.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.last().copied().unwrap_or(true)
    }

    /// Number of open blocks.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    /// Feeds one classified line through the stack, returning the content to process, if any.
    ///
    /// Directives are honored even inside inactive blocks so nesting stays balanced.
    ///
    /// # Errors
    /// On `#else` or `#endif` without an open block. The stack is left unchanged.
    #[inline]
    pub fn apply<'line>(
        &mut self,
        kind: ConfigLineKind<'line>,
        options: &Options,
    ) -> Result<Option<&'line str>, BlockError> {
        let active = self.is_active();
        match kind {
            ConfigLineKind::Blank => {}
            ConfigLineKind::IfDef(name) => self.0.push(active && options.is_defined(name)),
            ConfigLineKind::IfOne => self.0.push(active),
            ConfigLineKind::IfZero => self.0.push(false),
            ConfigLineKind::Else => {
                if self.depth() == 0 {
                    return Err(BlockError::UnexpectedElse);
                }
                let parent = self.0[self.0.len() - 2];
                if let Some(current) = self.0.last_mut() {
                    *current = parent && !*current;
                }
            }
            ConfigLineKind::EndIf => {
                if self.depth() == 0 {
                    return Err(BlockError::UnexpectedEndIf);
                }
                self.0.pop();
            }
            ConfigLineKind::Content(content) if active => return Ok(Some(content)),
            ConfigLineKind::Content(_) => {}
        }
        Ok(None)
    }
}
