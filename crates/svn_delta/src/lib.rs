// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The delta editor protocol (spec §4.1): a depth-first tree-edit calling
//! contract plus the combinators (§4.1.1) and protocol validator that
//! compose and harden it.

mod combinators;
mod editor;
mod validating;

pub use combinators::{compose, AmbientDepthFilter, Cancelling, DepthHandle, DepthSource, Tee};
pub use editor::{CopyFrom, Editor};
pub use validating::Validating;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use svn_error::Cancellation;
    use svn_txdelta::{NullSink, Window, WindowSink};
    use svn_types::{Checksum, Depth, RepoPath, Revision};

    /// A minimal recording editor: pushes one string per call onto a
    /// shared log, handing out sequential integer handles. Used to drive
    /// the combinators and the validator through realistic call
    /// sequences without a working copy or repository behind them.
    #[derive(Clone)]
    struct RecordingEditor {
        log: Arc<Mutex<Vec<String>>>,
        next_handle: Arc<Mutex<u64>>,
    }

    impl RecordingEditor {
        fn new() -> Self {
            RecordingEditor {
                log: Arc::new(Mutex::new(Vec::new())),
                next_handle: Arc::new(Mutex::new(0)),
            }
        }

        fn record(&self, line: impl Into<String>) {
            self.log.lock().unwrap().push(line.into());
        }

        fn fresh_handle(&self) -> u64 {
            let mut n = self.next_handle.lock().unwrap();
            let h = *n;
            *n += 1;
            h
        }

        fn lines(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Editor for RecordingEditor {
        type Handle = u64;

        async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle> {
            self.record(format!("open_root({base_rev:?})"));
            Ok(self.fresh_handle())
        }

        async fn delete_entry(
            &mut self,
            parent: &Self::Handle,
            name: &str,
            _base_rev: Revision,
        ) -> anyhow::Result<()> {
            self.record(format!("delete_entry({parent}, {name})"));
            Ok(())
        }

        async fn add_directory(
            &mut self,
            parent: &Self::Handle,
            name: &str,
            _copyfrom: Option<CopyFrom>,
        ) -> anyhow::Result<Self::Handle> {
            self.record(format!("add_directory({parent}, {name})"));
            Ok(self.fresh_handle())
        }

        async fn open_directory(
            &mut self,
            parent: &Self::Handle,
            name: &str,
            _base_rev: Revision,
        ) -> anyhow::Result<Self::Handle> {
            self.record(format!("open_directory({parent}, {name})"));
            Ok(self.fresh_handle())
        }

        async fn absent_directory(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
            self.record(format!("absent_directory({parent}, {name})"));
            Ok(())
        }

        async fn change_dir_prop(
            &mut self,
            dir: &Self::Handle,
            name: &str,
            _value: Option<Vec<u8>>,
        ) -> anyhow::Result<()> {
            self.record(format!("change_dir_prop({dir}, {name})"));
            Ok(())
        }

        async fn close_directory(&mut self, dir: &Self::Handle) -> anyhow::Result<()> {
            self.record(format!("close_directory({dir})"));
            Ok(())
        }

        async fn add_file(
            &mut self,
            parent: &Self::Handle,
            name: &str,
            _copyfrom: Option<CopyFrom>,
        ) -> anyhow::Result<Self::Handle> {
            self.record(format!("add_file({parent}, {name})"));
            Ok(self.fresh_handle())
        }

        async fn open_file(
            &mut self,
            parent: &Self::Handle,
            name: &str,
            _base_rev: Revision,
        ) -> anyhow::Result<Self::Handle> {
            self.record(format!("open_file({parent}, {name})"));
            Ok(self.fresh_handle())
        }

        async fn absent_file(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
            self.record(format!("absent_file({parent}, {name})"));
            Ok(())
        }

        async fn apply_textdelta(
            &mut self,
            file: &Self::Handle,
            _base_checksum: Option<Checksum>,
        ) -> anyhow::Result<Box<dyn WindowSink>> {
            self.record(format!("apply_textdelta({file})"));
            Ok(Box::new(NullSink))
        }

        async fn change_file_prop(
            &mut self,
            file: &Self::Handle,
            name: &str,
            _value: Option<Vec<u8>>,
        ) -> anyhow::Result<()> {
            self.record(format!("change_file_prop({file}, {name})"));
            Ok(())
        }

        async fn close_file(
            &mut self,
            file: &Self::Handle,
            _target_checksum: Option<Checksum>,
        ) -> anyhow::Result<()> {
            self.record(format!("close_file({file})"));
            Ok(())
        }

        async fn close_edit(&mut self) -> anyhow::Result<()> {
            self.record("close_edit()");
            Ok(())
        }

        async fn abort_edit(&mut self) -> anyhow::Result<()> {
            self.record("abort_edit()");
            Ok(())
        }
    }

    async fn drive_add_one_file<E: Editor>(editor: &mut E) -> anyhow::Result<()> {
        let root = editor.open_root(Revision::ZERO).await?;
        let file = editor.add_file(&root, "greeting.txt", None).await?;
        let mut sink = editor.apply_textdelta(&file, None).await?;
        sink.send_window(Window::insert(b"hello".to_vec())).await?;
        sink.send_window(Window::null()).await?;
        editor.close_file(&file, None).await?;
        editor.close_directory(&root).await?;
        editor.close_edit().await?;
        Ok(())
    }

    #[tokio::test]
    async fn validating_passes_through_a_well_formed_session() {
        let recorder = RecordingEditor::new();
        let mut editor = Validating::new(recorder.clone());
        drive_add_one_file(&mut editor).await.unwrap();
        assert!(recorder.lines().iter().any(|l| l == "close_edit()"));
    }

    #[tokio::test]
    async fn validating_rejects_close_edit_with_an_open_file() {
        let mut editor = Validating::new(RecordingEditor::new());
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        editor.add_file(&root, "f", None).await.unwrap();
        let err = editor.close_edit().await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn validating_rejects_double_add_without_delete() {
        let mut editor = Validating::new(RecordingEditor::new());
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        editor.add_file(&root, "f", None).await.unwrap();
        let err = editor.add_file(&root, "f", None).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn validating_allows_replace_after_delete() {
        let mut editor = Validating::new(RecordingEditor::new());
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        editor.add_file(&root, "f", None).await.unwrap();
        editor.delete_entry(&root, "f", Revision::ZERO).await.unwrap();
        let result = editor.add_file(&root, "f", None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn validating_rejects_close_file_before_terminating_window() {
        let mut editor = Validating::new(RecordingEditor::new());
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        let file = editor.add_file(&root, "f", None).await.unwrap();
        let mut sink = editor.apply_textdelta(&file, None).await.unwrap();
        sink.send_window(Window::insert(b"x".to_vec())).await.unwrap();
        let err = editor.close_file(&file, None).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn tee_drives_both_sides_through_the_same_session() {
        let a = RecordingEditor::new();
        let b = RecordingEditor::new();
        let mut editor = compose(a.clone(), b.clone());
        drive_add_one_file(&mut editor).await.unwrap();
        assert_eq!(a.lines(), b.lines());
    }

    #[tokio::test]
    async fn cancelling_stops_further_calls_once_cancelled() {
        let token = Cancellation::new();
        let mut editor = Cancelling::new(RecordingEditor::new(), token.clone());
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        token.cancel();
        let err = editor.add_directory(&root, "d", None).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn cancelling_still_allows_abort_after_cancel() {
        let token = Cancellation::new();
        let mut editor = Cancelling::new(RecordingEditor::new(), token.clone());
        editor.open_root(Revision::ZERO).await.unwrap();
        token.cancel();
        assert!(editor.abort_edit().await.is_ok());
    }

    struct FixedDepth(Depth);

    #[async_trait]
    impl DepthSource for FixedDepth {
        async fn depth_at(&self, _path: &RepoPath) -> anyhow::Result<Depth> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn ambient_depth_files_absorbs_directory_children() {
        let recorder = RecordingEditor::new();
        let mut editor = AmbientDepthFilter::new(recorder.clone(), FixedDepth(Depth::Files), Depth::Infinity);
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        let dir = editor.add_directory(&root, "sub", None).await.unwrap();
        assert!(matches!(dir, DepthHandle::Absorbed { .. }));
        editor.close_directory(&dir).await.unwrap();
        assert!(!recorder.lines().iter().any(|l| l.starts_with("add_directory")));
    }

    #[tokio::test]
    async fn ambient_depth_infinity_forwards_everything() {
        let recorder = RecordingEditor::new();
        let mut editor = AmbientDepthFilter::new(recorder.clone(), FixedDepth(Depth::Infinity), Depth::Infinity);
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        let dir = editor.add_directory(&root, "sub", None).await.unwrap();
        assert!(matches!(dir, DepthHandle::Forward { .. }));
        assert!(recorder.lines().iter().any(|l| l.starts_with("add_directory")));
    }

    #[tokio::test]
    async fn ambient_depth_requested_depth_clamps_recorded_depth() {
        let recorder = RecordingEditor::new();
        let mut editor = AmbientDepthFilter::new(recorder.clone(), FixedDepth(Depth::Infinity), Depth::Empty);
        let root = editor.open_root(Revision::ZERO).await.unwrap();
        let file = editor.add_file(&root, "f", None).await.unwrap();
        assert!(matches!(file, DepthHandle::Absorbed { .. }));
    }
}
