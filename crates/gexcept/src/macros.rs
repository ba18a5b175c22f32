/// Define an exception kind.
///
/// Generates a struct wrapping an [`ExceptionCore`](crate::ExceptionCore),
/// its constructors, and the `Throwable`, `Display` and `Error` impls.
///
/// # Forms
///
/// ```ignore
/// // Name reported by name() is the type name
/// define_exception!(pub IoException);
///
/// // Explicit reported name
/// define_exception!(pub RetryException, "RetryFailed");
///
/// // Doc comments and other attributes are forwarded
/// define_exception!(
///     /// Raised when the writer runs out of space.
///     pub DiskFullException
/// );
/// ```
///
/// # Generated constructors
///
/// | Constructor                          | cause | location | skip |
/// |--------------------------------------|-------|----------|------|
/// | `new(msg)`                           | -     | `""`     | 0    |
/// | `at(msg, location)`                  | -     | yes      | 0    |
/// | `with_cause(msg, &cause)`            | yes   | `""`     | 0    |
/// | `with_cause_at(msg, &cause, loc)`    | yes   | yes      | 0    |
/// | `from_parts(msg, cause, loc, skip)`  | opt   | yes      | yes  |
///
/// The captured stack starts at the caller of the constructor; `skip`
/// hides that many more frames, e.g. a helper that builds the exception.
#[macro_export]
macro_rules! define_exception {
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $crate::define_exception!($(#[$meta])* $vis $name, ::core::stringify!($name));
    };

    ($(#[$meta:meta])* $vis:vis $name:ident, $display:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $name {
            core: $crate::ExceptionCore,
        }

        #[allow(dead_code)]
        impl $name {
            /// Name reported by `Throwable::name`.
            pub const NAME: &'static str = $display;

            #[inline(never)]
            pub fn new(message: impl Into<String>) -> Self {
                $crate::__exception_body!(message, None, "", 0)
            }

            #[inline(never)]
            pub fn at(message: impl Into<String>, location: impl Into<String>) -> Self {
                $crate::__exception_body!(message, None, location, 0)
            }

            #[inline(never)]
            pub fn with_cause(message: impl Into<String>, cause: &dyn $crate::Throwable) -> Self {
                $crate::__exception_body!(message, Some(cause), "", 0)
            }

            #[inline(never)]
            pub fn with_cause_at(
                message: impl Into<String>,
                cause: &dyn $crate::Throwable,
                location: impl Into<String>,
            ) -> Self {
                $crate::__exception_body!(message, Some(cause), location, 0)
            }

            #[inline(never)]
            pub fn from_parts(
                message: impl Into<String>,
                cause: Option<&dyn $crate::Throwable>,
                location: impl Into<String>,
                skip_stack: usize,
            ) -> Self {
                $crate::__exception_body!(message, cause, location, skip_stack)
            }
        }

        impl $crate::Throwable for $name {
            fn name(&self) -> &'static str {
                Self::NAME
            }

            fn core(&self) -> &$crate::ExceptionCore {
                &self.core
            }

            fn clone_box(&self) -> ::std::boxed::Box<dyn $crate::Throwable> {
                ::std::boxed::Box::new(::core::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_error(&self) -> &(dyn ::std::error::Error + Send + Sync + 'static) {
                self
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str($crate::Throwable::what(self))
            }
        }

        impl ::std::error::Error for $name {
            fn source(&self) -> ::core::option::Option<&(dyn ::std::error::Error + 'static)> {
                self.core
                    .caused_by()
                    .map(|c| $crate::Throwable::as_error(c) as &(dyn ::std::error::Error + 'static))
            }
        }
    };
}

/// Constructor body shared by the kinds `define_exception!` generates.
///
/// Every constructor calls `ExceptionCore::new` directly and keeps its own
/// frame on the stack, so captured traces start at the constructor's caller.
#[doc(hidden)]
#[macro_export]
macro_rules! __exception_body {
    ($message:expr, $cause:expr, $location:expr, $skip:expr) => {
        ::std::hint::black_box(Self {
            core: $crate::ExceptionCore::new($message, $cause, $location, $skip),
        })
    };
}

/// `"file:line"` of the invocation site, the usual exception location.
#[macro_export]
macro_rules! strloc {
    () => {
        concat!(file!(), ":", line!())
    };
}

/// Construct an exception at the call site and raise it.
///
/// ```ignore
/// throw!(IoException, "short read");
/// throw!(RetryException, "giving up", cause = last_err);
/// ```
#[macro_export]
macro_rules! throw {
    ($kind:ty, $msg:expr) => {
        $crate::Throwable::raise(&<$kind>::at($msg, $crate::strloc!()))
    };

    ($kind:ty, $msg:expr, cause = $cause:expr) => {
        $crate::Throwable::raise(&<$kind>::with_cause_at($msg, &$cause, $crate::strloc!()))
    };
}

#[cfg(test)]
mod tests {
    use crate::stack::{set_thread_tracer, NullTracer};
    use crate::{catch_exception, Throwable};
    use std::sync::Arc;

    crate::define_exception!(
        /// Documented kind.
        pub(crate) ParseException
    );
    crate::define_exception!(TimeoutException, "Timeout");

    #[test]
    fn strloc_points_here() {
        let loc = crate::strloc!();
        assert!(loc.starts_with(file!()), "unexpected location: {}", loc);
        assert!(loc.ends_with(&format!(":{}", line!() - 2)), "unexpected location: {}", loc);
    }

    #[test]
    fn generated_constructors() {
        set_thread_tracer(Some(Arc::new(NullTracer)));
        let a = ParseException::new("a");
        assert_eq!(a.location(), "");
        assert!(a.caused_by().is_none());

        let b = TimeoutException::at("b", "net.rs:4");
        assert_eq!(b.location(), "net.rs:4");
        assert_eq!(b.what(), "Timeout: b at net.rs:4");

        let c = ParseException::with_cause_at("c", &b, "p.rs:1");
        assert_eq!(c.caused_by().map(|e| e.name()), Some("Timeout"));
        assert_eq!(c.core().stack().skip(), 0);

        let d = ParseException::from_parts("d", Some(&c), "", 3);
        assert_eq!(d.core().stack().skip(), 3);
        assert_eq!(d.chain().count(), 2);
    }

    #[test]
    fn throw_attaches_location() {
        set_thread_tracer(Some(Arc::new(NullTracer)));
        let caught = catch_exception(|| -> () { crate::throw!(ParseException, "bad token") })
            .unwrap_err();
        let e = caught.downcast_ref::<ParseException>().unwrap();
        assert_eq!(e.message(), "bad token");
        assert!(e.location().starts_with(file!()));
    }

    #[test]
    fn throw_with_cause() {
        set_thread_tracer(Some(Arc::new(NullTracer)));
        let first = TimeoutException::new("slow");
        let caught = catch_exception(|| -> () {
            crate::throw!(ParseException, "gave up", cause = first)
        })
        .unwrap_err();
        let e = caught.get().unwrap();
        assert!(e.is::<ParseException>());
        assert!(e.what().contains("\n--> Caused by: Timeout: slow"));
    }
}
