//! glibc `backtrace(3)` stack tracer
//!
//! `backtrace` walks the current stack into a caller-provided buffer.
//! Rendering resolves each address against the binary's symbol table and
//! debug info with the `backtrace` crate. Addresses it cannot name fall
//! back to `backtrace_symbols`, which only sees the dynamic symbol table
//! and prints `module(+off) [addr]`, and finally to the bare address.

use std::ffi::CStr;
use std::os::raw::{c_int, c_void};

use super::{format_frame, StackTracer, STACK_FRAME_BUFFER_SIZE};

/// Most frames `capture` can be asked to omit on top of its own.
const OMIT_LIMIT: usize = 16;

/// Platform stack tracer backed by glibc.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTracer;

impl StackTracer for NativeTracer {
    #[inline(never)]
    fn capture(&self, omit: usize, buf: &mut [usize]) -> usize {
        let mut raw = [std::ptr::null_mut::<c_void>(); STACK_FRAME_BUFFER_SIZE + OMIT_LIMIT];
        // Entry 0 is this function
        let drop = (omit + 1).min(OMIT_LIMIT);
        let cap = (buf.len() + drop).min(raw.len());

        // SAFETY: `raw` holds at least `cap` pointer slots and backtrace
        // writes no more than `cap` entries.
        let n = unsafe { libc::backtrace(raw.as_mut_ptr(), cap as c_int) };
        let n = usize::try_from(n).unwrap_or(0).min(cap);
        if n <= drop {
            return 0;
        }

        let mut written = 0;
        for (dst, src) in buf.iter_mut().zip(&raw[drop..n]) {
            *dst = *src as usize;
            written += 1;
        }
        written
    }

    fn render(&self, skip: usize, frames: &[usize]) -> String {
        let visible = frames.get(skip..).unwrap_or(&[]);
        if visible.is_empty() {
            return String::new();
        }

        let mut texts: Vec<Option<String>> = visible.iter().map(|&ip| resolve(ip)).collect();
        if texts.iter().any(Option::is_none) {
            dynamic_symbols(visible, &mut texts);
        }

        let mut out = String::new();
        for (i, (&ip, text)) in visible.iter().zip(&texts).enumerate() {
            match text {
                Some(t) => format_frame(&mut out, i, t),
                None => format_frame(&mut out, i, &format!("{:#x}", ip)),
            }
        }
        out
    }
}

/// `symbol at file:line` for a return address, innermost inlined symbol.
fn resolve(ip: usize) -> Option<String> {
    if ip == 0 {
        return None;
    }
    let mut text = None;
    // Return addresses point past the call; look up the call itself.
    backtrace::resolve((ip - 1) as *mut c_void, |sym| {
        if text.is_some() {
            return;
        }
        if let Some(name) = sym.name() {
            let mut s = name.to_string();
            if let (Some(file), Some(line)) = (sym.filename(), sym.lineno()) {
                s.push_str(&format!(" at {}:{}", file.display(), line));
            }
            text = Some(s);
        }
    });
    text
}

/// Fill the unresolved slots of `texts` from `backtrace_symbols(3)`.
fn dynamic_symbols(frames: &[usize], texts: &mut [Option<String>]) {
    let raw: Vec<*mut c_void> = frames.iter().map(|&ip| ip as *mut c_void).collect();

    // SAFETY: `raw` holds `raw.len()` addresses. The result is either
    // null or a single malloc'd block of `raw.len()` C strings, freed below.
    let symbols = unsafe { libc::backtrace_symbols(raw.as_ptr(), raw.len() as c_int) };
    if symbols.is_null() {
        return;
    }

    for (i, slot) in texts.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        // SAFETY: index is below the count passed to backtrace_symbols.
        let entry = unsafe { *symbols.add(i) };
        if !entry.is_null() {
            // SAFETY: entries are NUL-terminated and live until free().
            *slot = Some(unsafe { CStr::from_ptr(entry) }.to_string_lossy().into_owned());
        }
    }

    // SAFETY: allocated by backtrace_symbols with malloc.
    unsafe { libc::free(symbols as *mut c_void) };
}
