//! Panic capture for scenario bodies
//!
//! A process-wide panic hook is installed once. Threads that opt in with [`capture_panics`] have their panic
//! message, location and backtrace recorded instead of printed; every other thread keeps the previous hook.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use scenario_core::Failure;

static INSTALL: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<Failure>> = const { RefCell::new(None) };
}

fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CAPTURING.with(Cell::get) {
                previous(info);
                return;
            }

            let message = info.payload_as_str().unwrap_or("panic with a non-string payload").to_string();
            let mut stack_trace = info
                .location()
                .map(|location| format!("at {}", location))
                .unwrap_or_default();
            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                stack_trace.push('\n');
                stack_trace.push_str(&backtrace.to_string());
            }

            CAPTURED.with(|captured| {
                *captured.borrow_mut() = Some(Failure::new(message).with_stack_trace(stack_trace));
            });
        }));
    });
}

/// Run `body` on the current thread, converting a panic into a [`Failure`].
pub fn capture_panics<T>(body: impl FnOnce() -> T) -> Result<T, Failure> {
    install_hook();

    CAPTURING.with(|capturing| capturing.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(body));
    CAPTURING.with(|capturing| capturing.set(false));

    result.map_err(|payload| {
        CAPTURED
            .with(|captured| captured.borrow_mut().take())
            .unwrap_or_else(|| Failure::new(payload_message(payload.as_ref())))
    })
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
