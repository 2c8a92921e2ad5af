// src/notify.rs
// User-facing notification port. The real chat host shows toasts; the
// default sink maps them onto tracing events.

use tracing::{error, info, warn};

pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default sink: structured log events under the `limner::notify` target.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        info!(target: "limner::notify", "{message}");
    }

    fn success(&self, message: &str) {
        info!(target: "limner::notify", "{message}");
    }

    fn warning(&self, message: &str) {
        warn!(target: "limner::notify", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "limner::notify", "{message}");
    }
}
