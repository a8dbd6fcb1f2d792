//! Pipeline progress reporting
//!
//! Stages report to a [`ProgressSink`] after each unit of work. Pages may
//! finish out of order when recognized concurrently, so `PageRecognized`
//! carries a running count rather than assuming page order.

use serde::Serialize;

/// A progress update from a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Rasterizing the input
    Stripping,
    /// Rasterization done
    Stripped { pages: usize },
    /// One more page came back from the OCR engine
    PageRecognized {
        page: usize,
        completed: usize,
        total: usize,
    },
    /// Writing the output PDF
    Composing,
    /// Output is in place
    Finished,
}

impl ProgressEvent {
    /// Overall completion, 0.0 to 1.0
    ///
    /// Recognition dominates the run time and gets the 0.3..0.9 band.
    pub fn fraction(&self) -> f32 {
        match *self {
            Self::Stripping => 0.1,
            Self::Stripped { .. } => 0.3,
            Self::PageRecognized {
                completed, total, ..
            } => {
                if total == 0 {
                    0.9
                } else {
                    0.3 + 0.6 * (completed.min(total) as f32 / total as f32)
                }
            }
            Self::Composing => 0.9,
            Self::Finished => 1.0,
        }
    }

    /// Short human-readable status line
    pub fn message(&self) -> String {
        match *self {
            Self::Stripping => "Removing existing text layer".to_string(),
            Self::Stripped { pages } => format!("Rendered {} pages", pages),
            Self::PageRecognized {
                completed, total, ..
            } => format!("Recognized page {}/{}", completed, total),
            Self::Composing => "Writing searchable PDF".to_string(),
            Self::Finished => "Done".to_string(),
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_fraction_weighting() {
        assert_eq!(ProgressEvent::Stripping.fraction(), 0.1);
        assert_eq!(ProgressEvent::Stripped { pages: 4 }.fraction(), 0.3);

        let half = ProgressEvent::PageRecognized {
            page: 3,
            completed: 2,
            total: 4,
        };
        assert!((half.fraction() - 0.6).abs() < 1e-6);
        assert_eq!(ProgressEvent::Finished.fraction(), 1.0);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| seen.lock().unwrap().push(event);
        sink.report(ProgressEvent::Composing);
        sink.report(ProgressEvent::Finished);
        assert_eq!(
            *seen.lock().unwrap(),
            [ProgressEvent::Composing, ProgressEvent::Finished]
        );
    }
}
