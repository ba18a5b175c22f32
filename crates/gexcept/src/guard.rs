//! Scope guard that turns an escaping exception into a clean process exit
//!
//! ```ignore
//! let err = Exception::at("config corrupt", strloc!());
//! let _guard = UnwindGuard::new(&err);
//! risky_cleanup();   // if this unwinds, the process logs and exits 66
//! ```
//!
//! The guard checks for an in-flight unwind exactly once, when it is
//! dropped. Any unwind on the current thread triggers it, not only one
//! carrying the referenced exception.

use crate::Throwable;

/// Exit status used when a guarded scope unwinds.
pub const UNWIND_EXIT_CODE: i32 = 66;

/// Process-level collaborators of [`UnwindGuard`].
pub trait GuardHooks {
    /// Is the current thread unwinding?
    fn unwinding(&self) -> bool;

    /// Emit a fatal log record.
    fn fatal(&self, message: &str);

    /// Terminate the process. Test doubles may return.
    fn exit(&self, code: i32);
}

/// Real hooks: `std::thread::panicking`, `kfatal!`, `std::process::exit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessHooks;

impl GuardHooks for ProcessHooks {
    #[inline]
    fn unwinding(&self) -> bool {
        std::thread::panicking()
    }

    fn fatal(&self, message: &str) {
        crate::kfatal!("{}", message);
    }

    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

impl<H: GuardHooks + ?Sized> GuardHooks for &H {
    fn unwinding(&self) -> bool {
        (**self).unwinding()
    }

    fn fatal(&self, message: &str) {
        (**self).fatal(message)
    }

    fn exit(&self, code: i32) {
        (**self).exit(code)
    }
}

/// Logs and exits with [`UNWIND_EXIT_CODE`] if dropped during unwinding.
///
/// Borrows the exception it reports, so the exception must outlive the
/// guard. Not `Clone`; one guard, one check.
#[must_use = "the guard only acts when it is dropped at the end of the scope"]
pub struct UnwindGuard<'a, H: GuardHooks = ProcessHooks> {
    exception: &'a dyn Throwable,
    hooks: H,
}

impl<'a> UnwindGuard<'a> {
    pub fn new(exception: &'a dyn Throwable) -> Self {
        Self::with_hooks(exception, ProcessHooks)
    }
}

impl<'a, H: GuardHooks> UnwindGuard<'a, H> {
    pub fn with_hooks(exception: &'a dyn Throwable, hooks: H) -> Self {
        Self { exception, hooks }
    }

    #[inline]
    pub fn exception(&self) -> &'a dyn Throwable {
        self.exception
    }
}

impl<H: GuardHooks> Drop for UnwindGuard<'_, H> {
    fn drop(&mut self) {
        if !self.hooks.unwinding() {
            return;
        }
        let msg = format!(
            "Will exit with code {} due to: {}",
            UNWIND_EXIT_CODE,
            self.exception.what()
        );
        self.hooks.fatal(&msg);
        self.hooks.exit(UNWIND_EXIT_CODE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{set_thread_tracer, NullTracer};
    use crate::{catch_exception, Exception};
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    /// Records calls; `unwinding` follows the real thread state unless forced.
    #[derive(Default)]
    struct Recorder {
        force: Option<bool>,
        queries: Cell<usize>,
        fatal: RefCell<Vec<String>>,
        exits: RefCell<Vec<i32>>,
    }

    impl GuardHooks for Recorder {
        fn unwinding(&self) -> bool {
            self.queries.set(self.queries.get() + 1);
            self.force.unwrap_or_else(std::thread::panicking)
        }

        fn fatal(&self, message: &str) {
            self.fatal.borrow_mut().push(message.to_string());
        }

        fn exit(&self, code: i32) {
            self.exits.borrow_mut().push(code);
        }
    }

    #[test]
    fn quiet_when_not_unwinding() {
        let e = Exception::new("idle");
        let rec = Recorder::default();
        {
            let _guard = UnwindGuard::with_hooks(&e, &rec);
        }
        assert_eq!(rec.queries.get(), 1);
        assert_eq!(rec.fatal.borrow().len(), 0);
        assert!(rec.exits.borrow().is_empty());
    }

    #[test]
    fn fires_during_raise() {
        set_thread_tracer(Some(Arc::new(NullTracer)));
        let cause = Exception::at("disk full", "writer.save");
        let e = Exception::with_cause("retry failed", &cause);
        let rec = Recorder::default();

        let caught = catch_exception(|| {
            let _guard = UnwindGuard::with_hooks(&e, &rec);
            e.raise();
        });
        assert!(caught.is_err());

        let fatal = rec.fatal.borrow();
        assert_eq!(fatal.len(), 1);
        assert_eq!(
            fatal[0],
            "Will exit with code 66 due to: Exception: retry failed\
             \n--> Caused by: Exception: disk full at writer.save"
        );
        assert_eq!(*rec.exits.borrow(), vec![UNWIND_EXIT_CODE]);
    }

    #[test]
    fn fires_on_any_unwind() {
        set_thread_tracer(Some(Arc::new(NullTracer)));
        let e = Exception::new("guarded");
        let rec = Recorder::default();

        let outer = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = UnwindGuard::with_hooks(&e, &rec);
            std::panic::resume_unwind(Box::new("unrelated"));
        }));
        assert!(outer.is_err());
        assert_eq!(rec.fatal.borrow().len(), 1);
        assert!(rec.fatal.borrow()[0].ends_with("Exception: guarded"));
        assert_eq!(*rec.exits.borrow(), vec![66]);
    }

    #[test]
    fn forced_in_flight() {
        let e = Exception::new("x");
        let rec = Recorder {
            force: Some(true),
            ..Default::default()
        };
        drop(UnwindGuard::with_hooks(&e, &rec));
        assert_eq!(rec.fatal.borrow().len(), 1);
        assert!(rec.fatal.borrow()[0].contains(e.what()));
        assert_eq!(*rec.exits.borrow(), vec![66]);
    }

    #[test]
    fn process_hooks_noop_outside_unwind() {
        let e = Exception::new("calm");
        let guard = UnwindGuard::new(&e);
        assert_eq!(guard.exception().message(), "calm");
        drop(guard);
        // Still running: ProcessHooks did not exit
        assert!(!ProcessHooks.unwinding());
    }
}
