use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::OnceLock;

use dyn_clone::DynClone;

use crate::stack::{current_tracer, CapturedStack};
use crate::ExceptionPtr;

/// Separator placed before every entry of the cause chain in `what()`.
pub const CAUSED_BY: &str = "\n--> Caused by: ";

/// State shared by every exception kind.
///
/// Everything except the memoized description is fixed at construction.
/// Kinds embed one of these and expose it through [`Throwable::core`];
/// see [`define_exception!`](crate::define_exception).
#[derive(Clone)]
pub struct ExceptionCore {
    message:  String,
    location: String,
    cause:    Option<Box<dyn Throwable>>,
    stack:    CapturedStack,
    what:     OnceLock<String>,
}

impl ExceptionCore {
    /// Build the core, capturing the current stack.
    ///
    /// Meant to be called from a kind's constructor: the captured stack
    /// starts at the caller of that constructor, so neither this function
    /// nor the constructor shows up in the trace. `skip_stack` hides that
    /// many further frames when the stack is rendered.
    ///
    /// `cause` is deep-copied via [`Throwable::clone_box`], so the new
    /// exception owns an independent predecessor.
    #[inline(never)]
    pub fn new(
        message: impl Into<String>,
        cause: Option<&dyn Throwable>,
        location: impl Into<String>,
        skip_stack: usize,
    ) -> Self {
        // Omit this function and the kind's constructor
        let stack = CapturedStack::record(current_tracer(), skip_stack, 2);
        std::hint::black_box(Self {
            message:  message.into(),
            location: location.into(),
            cause:    cause.map(|c| c.clone_box()),
            stack,
            what:     OnceLock::new(),
        })
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    pub fn caused_by(&self) -> Option<&dyn Throwable> {
        self.cause.as_deref()
    }

    #[inline]
    pub fn stack(&self) -> &CapturedStack {
        &self.stack
    }

    /// `"<name>: <message>[ at <location>][\n<stack>]"`, without the cause chain.
    pub fn render_single(&self, name: &str) -> String {
        let mut s = String::with_capacity(name.len() + self.message.len() + 2);
        s.push_str(name);
        s.push_str(": ");
        s.push_str(&self.message);
        if !self.location.is_empty() {
            s.push_str(" at ");
            s.push_str(&self.location);
        }
        let trace = self.stack.render();
        if !trace.is_empty() {
            s.push('\n');
            s.push_str(&trace);
        }
        s
    }

    /// Full description including every ancestor, computed once.
    pub fn describe(&self, name: &str) -> &str {
        self.what.get_or_init(|| {
            let mut s = self.render_single(name);
            let mut next = self.caused_by();
            while let Some(c) = next {
                s.push_str(CAUSED_BY);
                s.push_str(&c.to_string_single());
                next = c.caused_by();
            }
            s
        })
    }
}

impl fmt::Debug for ExceptionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ExceptionCore");
        d.field("message", &self.message);
        if !self.location.is_empty() {
            d.field("location", &self.location);
        }
        if let Some(c) = &self.cause {
            d.field("cause", &format_args!("{}: {}", c.name(), c.message()));
        }
        d.field("stack", &self.stack);
        d.finish()
    }
}

/// The polymorphic exception interface.
///
/// Every kind reports its own [`name`](Throwable::name) and duplicates
/// itself as its own concrete type through
/// [`clone_box`](Throwable::clone_box), which is what lets
/// [`ExceptionPtr`] copy exceptions it knows only as `dyn Throwable`.
/// Implement it with [`define_exception!`](crate::define_exception)
/// rather than by hand.
pub trait Throwable: DynClone + Error + Send + Sync + 'static {
    /// Kind name, e.g. `"Exception"`.
    fn name(&self) -> &'static str;

    fn core(&self) -> &ExceptionCore;

    /// Deep copy preserving the concrete kind.
    fn clone_box(&self) -> Box<dyn Throwable>;

    fn as_any(&self) -> &dyn Any;

    fn as_error(&self) -> &(dyn Error + Send + Sync + 'static);

    #[inline]
    fn message(&self) -> &str {
        self.core().message()
    }

    #[inline]
    fn location(&self) -> &str {
        self.core().location()
    }

    /// The exception this one was raised in response to.
    #[inline]
    fn caused_by(&self) -> Option<&dyn Throwable> {
        self.core().caused_by()
    }

    /// Description of this link alone, without its causes.
    fn to_string_single(&self) -> String {
        self.core().render_single(self.name())
    }

    /// Full description, with the cause chain flattened oldest-last.
    /// Computed on first call; later calls return the same text.
    fn what(&self) -> &str {
        self.core().describe(self.name())
    }

    /// Iterate over the causes, immediate cause first.
    fn chain(&self) -> Chain<'_> {
        Chain { next: self.caused_by() }
    }

    /// Unwind with a copy of this exception.
    ///
    /// The panic payload is an [`ExceptionPtr`] holding a
    /// [`clone_box`](Throwable::clone_box) of `self`, so handlers recover
    /// the concrete kind with `downcast_ref`. Uses `resume_unwind`: the
    /// panic hook does not run, `std::thread::panicking()` is true while it
    /// propagates.
    fn raise(&self) -> ! {
        crate::ktrace!("raising {}: {}", self.name(), self.message());
        std::panic::resume_unwind(Box::new(ExceptionPtr::from_box(self.clone_box())))
    }
}

dyn_clone::clone_trait_object!(Throwable);

impl dyn Throwable {
    #[inline]
    pub fn is<T: Throwable>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Throwable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Iterator over a cause chain.
pub struct Chain<'a> {
    next: Option<&'a dyn Throwable>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a dyn Throwable;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.caused_by();
        Some(cur)
    }
}

crate::define_exception!(
    /// The base exception kind.
    pub Exception
);
