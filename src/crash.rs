use crate::record::ExceptionInfo;
use std::backtrace::Backtrace;
use std::panic::{self, PanicHookInfo};
use std::sync::{Arc, Mutex};

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Restores the previous panic hook when uninstalled or dropped.
///
/// Panic hooks are process-wide. Guards must be released in the reverse
/// order they were created; releasing out of order restores a stale hook.
pub struct CrashHandlerGuard {
    previous: Arc<Mutex<Option<PanicHook>>>,
    active: bool,
}

/// Install `callback` as a process-wide panic observer.
///
/// The callback runs first and the previously installed hook (normally the
/// default stderr printer) runs after it, so panics keep their usual
/// effect: the thread unwinds and, on the main thread, the process exits.
/// Panics inside tokio tasks go through the same hook.
pub fn install_crash_handler<F>(callback: F) -> CrashHandlerGuard
where
    F: Fn(&PanicHookInfo<'_>) + Send + Sync + 'static,
{
    let previous: Arc<Mutex<Option<PanicHook>>> = Arc::new(Mutex::new(Some(panic::take_hook())));
    let chained = Arc::clone(&previous);

    panic::set_hook(Box::new(move |info| {
        callback(info);
        if let Ok(guard) = chained.lock() {
            if let Some(hook) = guard.as_ref() {
                hook(info);
            }
        }
    }));

    CrashHandlerGuard { previous, active: true }
}

impl CrashHandlerGuard {
    /// Put the previous hook back.
    pub fn uninstall(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if !self.active || std::thread::panicking() {
            return;
        }
        self.active = false;
        let previous = self.previous.lock().ok().and_then(|mut slot| slot.take());
        if let Some(previous) = previous {
            // Dropping our hook here releases the Arc clone it captured.
            drop(panic::take_hook());
            panic::set_hook(previous);
        }
    }
}

impl Drop for CrashHandlerGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Describe a panic as exception info: payload text, location and a
/// captured backtrace.
pub fn panic_exception(info: &PanicHookInfo<'_>) -> ExceptionInfo {
    let payload = info.payload();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    };

    let thread = std::thread::current();
    let mut trace = format!("thread '{}' panicked", thread.name().unwrap_or("<unnamed>"));
    if let Some(location) = info.location() {
        trace.push_str(&format!(" at {}:{}:{}", location.file(), location.line(), location.column()));
    }
    trace.push('\n');
    trace.push_str(&Backtrace::force_capture().to_string());

    ExceptionInfo::new("panic", message).with_trace(trace)
}
