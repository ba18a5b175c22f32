//! # gexcept: Generic Exception
//!
//! A polymorphic exception base: every exception carries a message, an
//! optional location, an owned cause chain and a captured call stack, and
//! can be copied by value without knowing its concrete kind.
//!
//! ## Pieces
//!
//! - [`Throwable`] - the polymorphic interface (`name`, `what`,
//!   `clone_box`, `raise`, `caused_by`)
//! - [`Exception`] - the base kind; [`define_exception!`] makes more
//! - [`ExceptionPtr`] - owning box with deep-copy semantics
//! - [`UnwindGuard`] - logs and exits 66 if its scope unwinds
//! - [`stack`] - frame capture and rendering backends
//!
//! ## Quick Start
//!
//! ```rust
//! use gexcept::{catch_exception, define_exception, strloc, Exception, Throwable};
//!
//! define_exception!(pub DiskFullException);
//!
//! fn save() {
//!     DiskFullException::at("no space left", strloc!()).raise();
//! }
//!
//! let err = catch_exception(save).unwrap_err();
//! assert!(err.downcast_ref::<DiskFullException>().is_some());
//!
//! let wrapped = Exception::with_cause("retry failed", err.get().unwrap());
//! assert!(wrapped.what().contains("--> Caused by: DiskFullException: no space left"));
//! ```
//!
//! ## Environment
//!
//! | Variable           | Effect |
//! |--------------------|--------|
//! | `GEX_LOG_LEVEL`    | Log level for `k*!` macros (default `info`) |
//! | `GEX_FLUSH_EPRINT` | Flush stderr after each record |
//! | `GEX_BACKTRACE`    | Capture stacks on construction (default on) |

#[macro_use]
mod macros;
mod exception;
mod ptr;

pub mod config;
pub mod guard;
pub mod kprint;
pub mod stack;

// ── Public API ────────────────────────────────────────────────────

pub use exception::{Chain, Exception, ExceptionCore, Throwable, CAUSED_BY};
pub use ptr::{catch_exception, swap, ExResult, ExceptionPtr};
pub use guard::{GuardHooks, ProcessHooks, UnwindGuard, UNWIND_EXIT_CODE};
pub use stack::{CapturedStack, NativeTracer, NullTracer, StackTracer, STACK_FRAME_BUFFER_SIZE};
pub use kprint::{set_flush_enabled, set_log_level, LogLevel};
pub use config::Config;
