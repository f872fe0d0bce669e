//! Warn-once bookkeeping shared by every plugin of a session

use parking_lot::Mutex;
use std::collections::HashSet;

use crate::plugin::PluginContext;

/// Set of warning messages already reported
#[derive(Debug, Default)]
pub struct WarningSet {
    seen: Mutex<HashSet<String>>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `message` through `ctx` unless it was reported before.
    /// Returns whether it was reported now.
    pub fn warn_once(&self, ctx: &dyn PluginContext, message: &str) -> bool {
        if !self.seen.lock().insert(message.to_string()) {
            return false;
        }
        ctx.warn(message);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::RecordingContext;

    #[test]
    fn test_same_message_reported_once_across_contexts() {
        let warnings = WarningSet::new();
        let contexts: Vec<RecordingContext> = (0..5).map(|_| RecordingContext::new()).collect();

        for ctx in &contexts {
            warnings.warn_once(ctx, "deprecated");
        }
        let total: usize = contexts.iter().map(|c| c.warnings().len()).sum();
        assert_eq!(total, 1);
        assert_eq!(contexts[0].warnings(), vec!["deprecated".to_string()]);
    }

    #[test]
    fn test_distinct_messages_are_each_reported() {
        let warnings = WarningSet::new();
        let ctx = RecordingContext::new();
        assert!(warnings.warn_once(&ctx, "a"));
        assert!(warnings.warn_once(&ctx, "b"));
        assert!(!warnings.warn_once(&ctx, "a"));
        assert_eq!(ctx.warnings().len(), 2);
    }
}
