use std::fmt;
use std::sync::Arc;

use crate::ctx::CtxRef;
use crate::error::{ErrorKind, QuillError};
use crate::syntax::Span;

#[derive(Clone)]
pub struct Frame {
    pub name: Arc<str>,
    pub span: Option<Span>,
    pub env: CtxRef,
}

impl Frame {
    pub fn new(name: Arc<str>, span: Option<Span>, env: CtxRef) -> Self {
        Self { name, span, env }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("name", &self.name)
            .field("span", &self.span)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Backtrace {
    frames: Vec<Frame>,
}

impl Backtrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame, max_depth: usize) -> Result<(), QuillError> {
        if self.frames.len() >= max_depth {
            return Err(QuillError::runtime(
                ErrorKind::StackOverflowError,
                format!("evaluation depth limit exceeded (max: {})", max_depth),
            )
            .with_backtrace(self));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn render(&self) -> String {
        let index_width = self.frames.len().saturating_sub(1).to_string().len();
        let name_width = self
            .frames
            .iter()
            .map(|frame| frame.name.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for (idx, frame) in self.frames.iter().enumerate().rev() {
            let position = frame
                .span
                .map(|span| span.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let line = format!(
                "{:>iw$}: {:<nw$}  {}",
                idx,
                frame.name,
                position,
                iw = index_width,
                nw = name_width
            );
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::{Ctx, MissingVariable};

    fn frame(name: &str, line: usize) -> Frame {
        Frame::new(
            name.into(),
            Some(Span::new(line, 1, 0)),
            Ctx::new_root(MissingVariable::Raise),
        )
    }

    #[test]
    fn render_lists_innermost_first_with_aligned_columns() {
        let mut bt = Backtrace::new();
        for (idx, name) in ["PROGN", "fact", "IF", "*", "n", "x", "y", "z", "a", "b", "c"]
            .iter()
            .enumerate()
        {
            bt.push(frame(name, idx + 1), 100).unwrap();
        }
        let rendered = bt.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "10: c      11:1");
        assert_eq!(lines[10], " 0: PROGN  1:1");
    }

    #[test]
    fn push_refuses_past_the_depth_limit() {
        let mut bt = Backtrace::new();
        bt.push(frame("a", 1), 2).unwrap();
        bt.push(frame("b", 2), 2).unwrap();
        let err = bt.push(frame("c", 3), 2).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::StackOverflowError));
        assert_eq!(err.backtrace().map(Backtrace::len), Some(2));
        assert_eq!(bt.len(), 2);
    }
}
