#![cfg(unix)]

use std::thread;
use std::time::{Duration, Instant};

use cpt_engine::{cancel_on_signals, cancel_signal, is_cancelled};

#[test]
fn sigterm_raises_the_cancel_flag() {
    let cancel = cancel_signal();
    let guard = cancel_on_signals(&cancel).expect("install handlers");

    // SAFETY: the handler installed above replaces the default action.
    let rc = unsafe { libc::raise(libc::SIGTERM) };
    assert_eq!(rc, 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !is_cancelled(&cancel) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(is_cancelled(&cancel));
    drop(guard);
}
