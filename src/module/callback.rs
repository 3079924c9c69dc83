//! Staged-progress callback protocol.
//!
//! Long operations report progress through a [`StagedCallback`]: the
//! operation publishes its stage names once via `set_stages`, then for each
//! stage in the published order fires `on_start`, zero or more
//! `on_progress` calls with a 0-100 percentage, and `on_finish`.
//!
//! Callbacks compose: [`StageSlice`] wraps an outer callback and rescales a
//! sub-operation's whole staged run into the 0-100 range of a single outer
//! stage, so nested pipelines report through one progress indicator.

/// Per-stage progress events.
pub trait Callback {
    /// A stage began.
    fn on_start(&mut self) {}

    /// The current stage advanced to `percent` (0-100).
    fn on_progress(&mut self, _percent: u32) {}

    /// The current stage completed.
    fn on_finish(&mut self) {}
}

/// A [`Callback`] whose stages are named up front.
pub trait StagedCallback: Callback {
    /// Publish the names of all stages before any stage starts.
    fn set_stages(&mut self, names: &[String]);
}

/// Callback that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl Callback for NoopCallback {}

impl StagedCallback for NoopCallback {
    fn set_stages(&mut self, _names: &[String]) {}
}

/// Rescales an inner staged run into one stage slot of an outer callback.
///
/// The inner operation's `set_stages` only records how many sub-stages it
/// has; each inner progress report `p` during sub-stage `i` is forwarded to
/// the outer callback as `(i * 100 + p) / sub_stage_count`, i.e. the
/// aggregate completion of the whole inner run. The caller is responsible
/// for bracketing the inner run with the outer stage's `on_start` and
/// `on_finish`.
pub struct StageSlice<'a> {
    outer: &'a mut dyn StagedCallback,
    stage_count: u32,
    current: u32,
}

impl<'a> StageSlice<'a> {
    /// Wrap `outer`, rescaling the next inner run into its current stage.
    pub fn new(outer: &'a mut dyn StagedCallback) -> Self {
        Self {
            outer,
            stage_count: 1,
            current: 0,
        }
    }
}

impl Callback for StageSlice<'_> {
    fn on_start(&mut self) {
        // Inner stage boundaries are invisible to the outer indicator.
    }

    fn on_progress(&mut self, percent: u32) {
        let numerator = self.current * 100 + percent;
        self.outer.on_progress(numerator / self.stage_count);
    }

    fn on_finish(&mut self) {
        self.current += 1;
    }
}

impl StagedCallback for StageSlice<'_> {
    fn set_stages(&mut self, names: &[String]) {
        self.stage_count = names.len().max(1) as u32;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// One observed callback event, for asserting invocation order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Event {
        Stages(Vec<String>),
        Start,
        Progress(u32),
        Finish,
    }

    /// Records every event it receives.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingCallback {
        pub(crate) events: Vec<Event>,
    }

    impl RecordingCallback {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn stage_names(&self) -> Vec<String> {
            self.events
                .iter()
                .find_map(|e| match e {
                    Event::Stages(names) => Some(names.clone()),
                    _ => None,
                })
                .unwrap_or_default()
        }

        pub(crate) fn progress_values(&self) -> Vec<u32> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Progress(p) => Some(*p),
                    _ => None,
                })
                .collect()
        }
    }

    impl Callback for RecordingCallback {
        fn on_start(&mut self) {
            self.events.push(Event::Start);
        }

        fn on_progress(&mut self, percent: u32) {
            self.events.push(Event::Progress(percent));
        }

        fn on_finish(&mut self) {
            self.events.push(Event::Finish);
        }
    }

    impl StagedCallback for RecordingCallback {
        fn set_stages(&mut self, names: &[String]) {
            self.events.push(Event::Stages(names.to_vec()));
        }
    }
}
