//! Per-run reporting and cancellation.
//!
//! Recoverable problems are collected here instead of aborting the trace.
//! Each run owns its own sink, so concurrent runs never share log state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TraceError;

/// A recoverable event recorded during tracing or writing.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Geometry collapsed to nothing traceable (e.g. despeckle removed all
    /// foreground, or a skeleton pixel had no neighbours).
    DegenerateGeometry { detail: String },
    /// Subdivision stopped at its guard; the best cubic was kept.
    FittingNonConvergence { points: usize, error: f64, depth: u32 },
    /// The least-squares system for a cubic was singular; a line was used.
    LinearFallback { points: usize },
    /// A format without beziers flattened `count` cubics into polylines.
    UnsupportedFeature { format: &'static str, count: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DegenerateGeometry { detail } => write!(f, "degenerate geometry: {}", detail),
            Diagnostic::FittingNonConvergence { points, error, depth } => write!(
                f,
                "fit did not converge over {} points (error {:.3} px at depth {})",
                points, error, depth
            ),
            Diagnostic::LinearFallback { points } => {
                write!(f, "singular fit over {} points, used a line", points)
            }
            Diagnostic::UnsupportedFeature { format, count } => {
                write!(f, "{}: {} cubic segment(s) flattened to polylines", format, count)
            }
        }
    }
}

/// Collects [`Diagnostic`]s for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Diagnostic) {
        match &event {
            Diagnostic::UnsupportedFeature { .. } => log::warn!("{}", event),
            _ => log::debug!("{}", event),
        }
        self.events.push(event);
    }

    /// Append another sink's events, preserving their order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }

    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn count_where(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

/// Cooperative cancellation flag, cheap to clone and share across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), TraceError> {
        if self.is_cancelled() {
            Err(TraceError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything a pipeline run reports into or polls, passed explicitly.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    pub diagnostics: Diagnostics,
    pub cancel: CancelToken,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            cancel,
        }
    }

    /// A fresh context sharing this one's cancellation flag, for a parallel worker.
    pub fn child(&self) -> Self {
        Self::with_cancel(self.cancel.clone())
    }
}
