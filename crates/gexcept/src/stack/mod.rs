//! Call-stack capture for exceptions
//!
//! An exception records up to [`STACK_FRAME_BUFFER_SIZE`] return addresses
//! when it is constructed and renders them only when its description is
//! first requested. Capture and symbolization are delegated to a
//! [`StackTracer`]:
//!
//! - [`NativeTracer`] - platform unwinder (`backtrace(3)` on glibc Linux,
//!   zero frames elsewhere)
//! - [`NullTracer`] - never captures anything
//!
//! The tracer used by [`CapturedStack::capture`] is, in order:
//! 1. the per-thread override installed with [`set_thread_tracer`]
//! 2. `NativeTracer` if `GEX_BACKTRACE` is on (the default)
//! 3. `NullTracer`

use std::cell::RefCell;
use std::fmt;
use std::hint;
use std::sync::{Arc, OnceLock};

use crate::config::Config;

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
        mod glibc;
        pub use glibc::NativeTracer;
    } else {
        mod fallback;
        pub use fallback::NativeTracer;
    }
}

/// Capacity of the per-exception frame buffer
pub const STACK_FRAME_BUFFER_SIZE: usize = 25;

/// Stack capture and rendering backend.
pub trait StackTracer: Send + Sync + 'static {
    /// Fill `buf` with return addresses of the current call stack, innermost
    /// first, and return how many were written.
    ///
    /// The tracer's own frame is never reported, and the `omit` frames
    /// directly above its caller are dropped before filling, so the first
    /// entry belongs to the `omit + 1`th caller up. Stacks deeper than
    /// `buf.len()` are truncated.
    fn capture(&self, omit: usize, buf: &mut [usize]) -> usize;

    /// Render `frames` as text, hiding the first `skip` of them.
    /// One frame per line, no trailing newline; empty if nothing is visible.
    fn render(&self, skip: usize, frames: &[usize]) -> String;
}

/// Tracer that never captures a frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl StackTracer for NullTracer {
    fn capture(&self, _omit: usize, _buf: &mut [usize]) -> usize {
        0
    }

    fn render(&self, _skip: usize, _frames: &[usize]) -> String {
        String::new()
    }
}

/// Shared frame-line layout for tracers: `"    #<n> <text>"`.
#[cfg_attr(not(all(target_os = "linux", target_env = "gnu")), allow(dead_code))]
pub(crate) fn format_frame(out: &mut String, index: usize, text: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str("    #");
    out.push_str(&index.to_string());
    out.push(' ');
    out.push_str(text);
}

thread_local! {
    static THREAD_TRACER: RefCell<Option<Arc<dyn StackTracer>>> = const { RefCell::new(None) };
}

/// Install (or clear, with `None`) the tracer used for exceptions created
/// on the current thread. Returns the previous override.
pub fn set_thread_tracer(tracer: Option<Arc<dyn StackTracer>>) -> Option<Arc<dyn StackTracer>> {
    THREAD_TRACER.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), tracer))
}

fn default_tracer() -> Arc<dyn StackTracer> {
    static DEFAULT: OnceLock<Arc<dyn StackTracer>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| {
            if Config::from_env().backtrace {
                Arc::new(NativeTracer)
            } else {
                crate::kdebug!("stack capture disabled via {}", crate::config::ENV_BACKTRACE);
                Arc::new(NullTracer)
            }
        })
        .clone()
}

/// The tracer exceptions constructed on this thread will use.
pub fn current_tracer() -> Arc<dyn StackTracer> {
    THREAD_TRACER
        .with(|slot| slot.borrow().clone())
        .unwrap_or_else(default_tracer)
}

/// Frames captured at exception construction.
///
/// The first captured frame is the caller of the capturing function; the
/// library's own frames are dropped at capture time and never use up the
/// buffer. `skip` hides further frames at render time.
///
/// Keeps a handle to the tracer that produced the frames so they are
/// always rendered by the same backend.
#[derive(Clone)]
pub struct CapturedStack {
    frames: [usize; STACK_FRAME_BUFFER_SIZE],
    count: usize,
    skip: usize,
    tracer: Arc<dyn StackTracer>,
}

impl CapturedStack {
    /// Capture the current stack with the thread's tracer, starting at the
    /// caller of `capture`.
    #[inline(never)]
    pub fn capture(skip: usize) -> Self {
        hint::black_box(Self::record(current_tracer(), skip, 1))
    }

    /// Like [`capture`](Self::capture) with an explicit tracer.
    #[inline(never)]
    pub fn capture_with(tracer: Arc<dyn StackTracer>, skip: usize) -> Self {
        hint::black_box(Self::record(tracer, skip, 1))
    }

    /// Capture, dropping `record` itself plus the `omit` frames above it.
    ///
    /// Every function between the first kept frame and here must be
    /// `#[inline(never)]` and must not end in a tail call.
    #[inline(never)]
    pub(crate) fn record(tracer: Arc<dyn StackTracer>, skip: usize, omit: usize) -> Self {
        let mut frames = [0usize; STACK_FRAME_BUFFER_SIZE];
        let count = tracer.capture(omit + 1, &mut frames).min(STACK_FRAME_BUFFER_SIZE);
        Self {
            frames,
            count,
            skip,
            tracer,
        }
    }

    /// Valid captured frames (including the skipped ones).
    #[inline]
    pub fn frames(&self) -> &[usize] {
        &self.frames[..self.count]
    }

    #[inline]
    pub fn skip(&self) -> usize {
        self.skip
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Human-readable trace of the visible frames.
    pub fn render(&self) -> String {
        if self.count == 0 {
            return String::new();
        }
        self.tracer.render(self.skip, self.frames())
    }
}

impl fmt::Debug for CapturedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedStack")
            .field("count", &self.count)
            .field("skip", &self.skip)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic tracer: reports `depth` synthetic frames 0x1000, 0x1001, ...
    pub(crate) struct FixedTracer {
        pub depth: usize,
    }

    impl StackTracer for FixedTracer {
        fn capture(&self, _omit: usize, buf: &mut [usize]) -> usize {
            let n = self.depth.min(buf.len());
            for (i, slot) in buf[..n].iter_mut().enumerate() {
                *slot = 0x1000 + i;
            }
            n
        }

        fn render(&self, skip: usize, frames: &[usize]) -> String {
            let mut out = String::new();
            for (i, ip) in frames.iter().enumerate().skip(skip) {
                format_frame(&mut out, i - skip, &format!("{:#x}", ip));
            }
            out
        }
    }

    #[test]
    fn null_tracer_captures_nothing() {
        let stack = CapturedStack::capture_with(Arc::new(NullTracer), 0);
        assert!(stack.is_empty());
        assert_eq!(stack.render(), "");
    }

    #[test]
    fn fixed_tracer_render_skips() {
        let stack = CapturedStack::capture_with(Arc::new(FixedTracer { depth: 3 }), 1);
        assert_eq!(stack.frames(), &[0x1000, 0x1001, 0x1002]);
        assert_eq!(stack.skip(), 1);
        assert_eq!(stack.render(), "    #0 0x1001\n    #1 0x1002");
    }

    #[test]
    fn deep_stack_truncates_silently() {
        let stack = CapturedStack::capture_with(Arc::new(FixedTracer { depth: 1000 }), 0);
        assert_eq!(stack.frames().len(), STACK_FRAME_BUFFER_SIZE);
        assert_eq!(stack.render().lines().count(), STACK_FRAME_BUFFER_SIZE);
    }

    #[test]
    fn skip_past_end_renders_empty() {
        let stack = CapturedStack::capture_with(Arc::new(FixedTracer { depth: 2 }), 5);
        assert_eq!(stack.render(), "");
    }

    #[test]
    fn thread_override_is_thread_local() {
        let prev = set_thread_tracer(Some(Arc::new(FixedTracer { depth: 4 })));
        assert_eq!(CapturedStack::capture(0).frames().len(), 4);

        let other = std::thread::spawn(|| {
            set_thread_tracer(Some(Arc::new(NullTracer)));
            CapturedStack::capture(0).frames().len()
        })
        .join()
        .unwrap();
        assert_eq!(other, 0);

        // Still ours after the other thread installed its own
        assert_eq!(CapturedStack::capture(0).frames().len(), 4);
        set_thread_tracer(prev);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn native_tracer_sees_frames() {
        let stack = CapturedStack::capture_with(Arc::new(NativeTracer), 0);
        assert!(!stack.is_empty(), "backtrace(3) returned no frames");
        assert!(!stack.render().is_empty());
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[inline(never)]
    fn raising_site() -> crate::Exception {
        hint::black_box(crate::Exception::new("x"))
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn native_trace_starts_at_constructor_caller() {
        use crate::Throwable;

        let prev = set_thread_tracer(Some(Arc::new(NativeTracer)));
        let e = raising_site();
        set_thread_tracer(prev);

        let trace = e.core().stack().render();
        let first = trace.lines().next().expect("no frames rendered");
        assert!(first.starts_with("    #0 "), "unexpected layout: {}", first);
        assert!(first.contains("raising_site"), "frame #0 is {}", first);
        for internal in ["StackTracer", "CapturedStack", "ExceptionCore", "from_parts", "Exception::new"] {
            assert!(!trace.contains(internal), "{} leaked into:\n{}", internal, trace);
        }
    }
}
