// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;

use crate::window::Window;

/// A streaming consumer of a text-delta window sequence (spec §4.3
/// "Streaming", the Rust shape of `svn_txdelta_window_handler_t`). The
/// caller pushes windows in order and finishes with a null window
/// (`Window::null()`); `send_window` never buffers the whole target.
#[async_trait]
pub trait WindowSink: Send {
    async fn send_window(&mut self, window: Window) -> anyhow::Result<()>;
}

/// Accumulates windows into a complete target byte string. This is the
/// in-process equivalent of handing a window stream to the working copy
/// or to a filesystem transaction: each window's ops are resolved against
/// the fixed `source` and the window's own partial target before being
/// appended to the growing `target`.
pub struct ApplyingSink<'a> {
    source: &'a [u8],
    target: Vec<u8>,
    finished: bool,
}

impl<'a> ApplyingSink<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        ApplyingSink {
            source,
            target: Vec::new(),
            finished: false,
        }
    }

    /// The reconstructed target. Valid to call only after the terminating
    /// null window has been sent.
    pub fn finish(self) -> anyhow::Result<Vec<u8>> {
        if !self.finished {
            anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(
                "textdelta window stream ended without a terminating null window".to_string()
            ));
        }
        Ok(self.target)
    }
}

#[async_trait]
impl<'a> WindowSink for ApplyingSink<'a> {
    async fn send_window(&mut self, window: Window) -> anyhow::Result<()> {
        if self.finished {
            anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(
                "window pushed after the terminating null window".to_string()
            ));
        }
        window.validate()?;
        if window.is_null() {
            self.finished = true;
            return Ok(());
        }
        let window_target = crate::apply::apply_window(self.source, &window)?;
        self.target.extend_from_slice(&window_target);
        Ok(())
    }
}

/// Discards every window without producing output; used by combinators
/// that absorb a subtree the ambient depth excludes (spec §4.2).
#[derive(Default)]
pub struct NullSink;

#[async_trait]
impl WindowSink for NullSink {
    async fn send_window(&mut self, _window: Window) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn applying_sink_requires_a_terminating_null_window() {
        let source = b"hello";
        let mut sink = ApplyingSink::new(source);
        sink.send_window(Window::insert(b"hi".to_vec())).await.unwrap();
        assert!(sink.finish().is_err());
    }

    #[tokio::test]
    async fn applying_sink_finishes_after_null_window() {
        let source = b"hello";
        let mut sink = ApplyingSink::new(source);
        sink.send_window(Window::insert(b"hi".to_vec())).await.unwrap();
        sink.send_window(Window::null()).await.unwrap();
        let target = sink.finish().unwrap();
        assert_eq!(target, b"hi");
    }

    #[tokio::test]
    async fn window_after_null_is_rejected() {
        let mut sink = ApplyingSink::new(b"hello");
        sink.send_window(Window::null()).await.unwrap();
        let err = sink.send_window(Window::insert(b"x".to_vec())).await;
        assert!(err.is_err());
    }
}
