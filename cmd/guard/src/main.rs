//! UnwindGuard example
//!
//! Catches a storage failure, wraps it with context, and re-raises it
//! inside a guarded scope. The guard logs the full description (cause
//! chain and stack) and the process exits with status 66.
//!
//! # Usage
//!
//! ```text
//! cargo run -p gexcept-guard; echo $?            # 66
//! cargo run -p gexcept-guard -- --handled; echo $?  # 0
//! ```
//!
//! # Environment Variables
//!
//! - `GUARD_JOURNAL=<path>` - Path named in the storage failure
//! - `GEX_BACKTRACE=0` - Skip stack capture (shorter output)
//! - `GEX_LOG_LEVEL=debug` - More logging

use gexcept::config::env_get_str;
use gexcept::{
    catch_exception, define_exception, kinfo, kwarn, strloc, ExceptionPtr, Throwable, UnwindGuard,
};

define_exception!(
    /// Storage layer failure.
    pub StorageException
);
define_exception!(
    /// Failure while shutting down.
    pub ShutdownException
);

fn save(path: &str) {
    StorageException::at(format!("disk full writing {}", path), strloc!()).raise();
}

fn main() {
    let handled = std::env::args().any(|a| a == "--handled");
    let journal = env_get_str("GUARD_JOURNAL", "/var/data/journal");

    let mut last = ExceptionPtr::new();
    if let Err(e) = catch_exception(|| save(&journal)) {
        kwarn!("save failed: {}", e.get().map(|t| t.message()).unwrap_or(""));
        last = e;
    }

    let Some(cause) = last.get() else {
        kinfo!("nothing failed");
        return;
    };
    let err = ShutdownException::with_cause_at("flush on shutdown failed", cause, strloc!());

    if handled {
        let _guard = UnwindGuard::new(&err);
        match catch_exception(|| err.raise()) {
            Ok(()) => {}
            Err(e) => kinfo!("handled {}", e.get().map(|t| t.name()).unwrap_or("?")),
        }
        // Guard drops here with nothing in flight: no-op
        return;
    }

    let _guard = UnwindGuard::new(&err);
    err.raise();
}
