// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transaction boundary for the host's undo log.
//!
//! Multi-step edits open a [`Transaction`] before the first mutation. The guard closes it
//! with [`UndoLog::commit`] when the edit succeeds and with [`UndoLog::abort`] on every
//! other exit path, including early returns through `?`.

/// Scoped start/commit/abort contract of an external undo log.
pub trait UndoLog {
    /// Open a transaction.
    fn begin(&mut self, label: &str);
    /// Close the open transaction, keeping its effects as one undoable step.
    fn commit(&mut self);
    /// Close the open transaction, discarding it.
    fn abort(&mut self);
}

/// An undo log that records nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoUndo;

impl UndoLog for NoUndo {
    fn begin(&mut self, _label: &str) {}
    fn commit(&mut self) {}
    fn abort(&mut self) {}
}

/// One call made against an [`UndoJournal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoEvent {
    /// `begin(label)`.
    Begin(String),
    /// `commit()`.
    Commit,
    /// `abort()`.
    Abort,
}

/// An undo log that keeps the sequence of calls, for hosts that replay or inspect them.
#[derive(Clone, Debug, Default)]
pub struct UndoJournal {
    /// Calls in order.
    pub events: Vec<UndoEvent>,
}

impl UndoLog for UndoJournal {
    fn begin(&mut self, label: &str) {
        self.events.push(UndoEvent::Begin(label.to_owned()));
    }

    fn commit(&mut self) {
        self.events.push(UndoEvent::Commit);
    }

    fn abort(&mut self) {
        self.events.push(UndoEvent::Abort);
    }
}

/// RAII guard around one undo transaction.
///
/// Aborts on drop unless [`Transaction::commit`] was called.
#[derive(Debug)]
pub struct Transaction<'a, U: UndoLog + ?Sized> {
    log: &'a mut U,
    open: bool,
}

impl<'a, U: UndoLog + ?Sized> Transaction<'a, U> {
    /// Begin a transaction named `label`.
    pub fn begin(log: &'a mut U, label: &str) -> Self {
        log::trace!("undo: begin {label}");
        log.begin(label);
        Self { log, open: true }
    }

    /// Commit and close.
    pub fn commit(mut self) {
        self.open = false;
        self.log.commit();
    }

    /// Finish with `result`: commit on `Ok`, abort on `Err`.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E> {
        if result.is_ok() {
            self.commit();
        }
        result
    }
}

impl<U: UndoLog + ?Sized> Drop for Transaction<'_, U> {
    fn drop(&mut self) {
        if self.open {
            log::trace!("undo: abort");
            self.log.abort();
        }
    }
}
