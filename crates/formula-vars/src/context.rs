use crate::registry::VarHandle;
use crate::settings::EvalSettings;

/// A formula binding whose container/consumer notifications were postponed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredBinding {
    pub handle: VarHandle,
    /// Whether the installed formula folded down to a constant. Formulas that are constant
    /// before folding are assigned as plain values instead, so this is only set for formulas
    /// whose references disappear in `simplify_constants`.
    pub is_constant: bool,
}

/// Evaluation mode threaded through every computing or rebinding call.
///
/// Holds the two switches that shape a pass: whether dependent variables are memoized for the
/// pass, and whether formula bindings notify containers/consumers immediately or queue the
/// notifications for [`Registry::flush_deferred`](crate::Registry::flush_deferred).
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pass_caching: bool,
    deferred: Option<Vec<DeferredBinding>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &EvalSettings) -> Self {
        Self {
            pass_caching: settings.pass_caching,
            deferred: None,
        }
    }

    #[must_use]
    pub fn with_pass_caching(mut self, enabled: bool) -> Self {
        self.pass_caching = enabled;
        self
    }

    pub fn pass_caching(&self) -> bool {
        self.pass_caching
    }

    pub fn set_pass_caching(&mut self, enabled: bool) {
        self.pass_caching = enabled;
    }

    /// Start queueing binding notifications. Already queued bindings are kept.
    pub fn defer_notifications(&mut self) {
        self.deferred.get_or_insert_with(Vec::new);
    }

    pub fn is_deferring(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn deferred(&self) -> &[DeferredBinding] {
        self.deferred.as_deref().unwrap_or(&[])
    }

    /// Returns `false` (and records nothing) when not deferring.
    pub(crate) fn record_binding(&mut self, binding: DeferredBinding) -> bool {
        match self.deferred.as_mut() {
            Some(queue) => {
                queue.push(binding);
                true
            }
            None => false,
        }
    }

    /// Stop deferring and hand back everything queued so far.
    pub(crate) fn take_deferred(&mut self) -> Vec<DeferredBinding> {
        self.deferred.take().unwrap_or_default()
    }
}
