//! Collection point for diagnostics raised during analysis and lowering.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::{Mutex, MutexGuard};

/// Accumulates diagnostics in emission order.
///
/// Passes take `&DiagnosticSink` and may run on several threads; the caller
/// drains or inspects the sink once they finish.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        // Pushing a finished value cannot leave the Vec inconsistent.
        self.diagnostics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        self.lock().push(diag);
    }

    /// Number of diagnostics with exactly `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|d| d.severity == severity).count()
    }

    /// Number of warnings emitted so far.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// The most severe level emitted, if any.
    pub fn worst(&self) -> Option<Severity> {
        self.lock().iter().map(|d| d.severity).max()
    }

    /// Codes of all held diagnostics in emission order.
    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.lock().iter().map(|d| d.code).collect()
    }

    /// Number of diagnostics held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the sink holds nothing.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drains the sink.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Copies out everything held without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }
}
