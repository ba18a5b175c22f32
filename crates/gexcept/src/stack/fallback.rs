//! Fallback stack tracer
//!
//! Used on platforms without `backtrace(3)`. Exceptions still work, they
//! just carry an empty trace.

use super::StackTracer;

/// Platform stack tracer (no-op on this target).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTracer;

impl StackTracer for NativeTracer {
    fn capture(&self, _omit: usize, _buf: &mut [usize]) -> usize {
        0
    }

    fn render(&self, _skip: usize, _frames: &[usize]) -> String {
        String::new()
    }
}
