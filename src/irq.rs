use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A settable, level-triggered interrupt line owned by the platform.
pub trait InterruptLine: Send + Sync {
    fn set_level(&self, asserted: bool);
}

impl<T: InterruptLine + ?Sized> InterruptLine for std::sync::Arc<T> {
    fn set_level(&self, asserted: bool) {
        (**self).set_level(asserted)
    }
}

/// In-process interrupt line.
///
/// Records the current level and how many times it has been asserted, and
/// optionally forwards every level change to a handler (e.g. an interrupt
/// controller model).
#[derive(Default)]
pub struct IrqLine {
    level: AtomicBool,
    assertions: AtomicU64,
    handler: Option<Box<dyn Fn(bool) + Send + Sync>>,
}

impl IrqLine {
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    pub fn is_asserted(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    pub fn assertions(&self) -> u64 {
        self.assertions.load(Ordering::SeqCst)
    }

    pub fn raise(&self) {
        self.set_level(true);
    }

    pub fn lower(&self) {
        self.set_level(false);
    }
}

impl InterruptLine for IrqLine {
    fn set_level(&self, asserted: bool) {
        self.level.store(asserted, Ordering::SeqCst);
        if asserted {
            self.assertions.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(handler) = &self.handler {
            handler(asserted);
        }
    }
}

impl std::fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrqLine")
            .field("level", &self.is_asserted())
            .field("assertions", &self.assertions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_level_and_count() {
        let line = IrqLine::default();
        assert!(!line.is_asserted());

        line.raise();
        line.raise();
        assert!(line.is_asserted());
        assert_eq!(line.assertions(), 2);

        line.lower();
        assert!(!line.is_asserted());
        assert_eq!(line.assertions(), 2);
    }

    #[test]
    fn test_handler_sees_level_changes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let line = IrqLine::with_handler(move |level| seen_clone.lock().unwrap().push(level));

        line.raise();
        line.lower();
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
