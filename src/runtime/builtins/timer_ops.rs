//! Timer file descriptors and readability polling.
//!
//! Timers are Linux `timerfd`s; polling goes through `mio`. Without the
//! `timers` feature, or on other platforms, every call fails.

use crate::runtime::value::Value;

use super::helpers::{arg_int, arg_millis, check_arity, format_hint};

fn os_error(name: &str, err: std::io::Error, signature: &str) -> String {
    format!("{}: {}{}", name, err, format_hint(signature))
}

fn arg_fd(args: &[Value], name: &str, signature: &str) -> Result<i32, String> {
    let fd = arg_int(args, 0, name, "descriptor", signature)?;
    i32::try_from(fd).map_err(|_| {
        format!(
            "{}: invalid descriptor {}{}",
            name,
            fd,
            format_hint(signature)
        )
    })
}

pub(super) fn builtin_timer_create(args: &[Value]) -> Result<Value, String> {
    check_arity(args, 0, "timer_create", "timer_create()")?;
    let fd = sys::create().map_err(|e| os_error("timer_create", e, "timer_create()"))?;
    Ok(Value::Int(fd as i64))
}

pub(super) fn builtin_timer_arm(args: &[Value]) -> Result<Value, String> {
    const SIGNATURE: &str = "timer_arm(fd, initial_ms, interval_ms)";
    check_arity(args, 3, "timer_arm", SIGNATURE)?;
    let fd = arg_fd(args, "timer_arm", SIGNATURE)?;
    let initial = arg_millis(args, 1, "timer_arm", "initial delay", SIGNATURE)?;
    let interval = arg_millis(args, 2, "timer_arm", "interval", SIGNATURE)?;
    sys::arm(fd, initial, interval).map_err(|e| os_error("timer_arm", e, SIGNATURE))?;
    Ok(Value::Bool(true))
}

/// Number of expirations since the last read; zero when none is pending.
pub(super) fn builtin_timer_read(args: &[Value]) -> Result<Value, String> {
    check_arity(args, 1, "timer_read", "timer_read(fd)")?;
    let fd = arg_fd(args, "timer_read", "timer_read(fd)")?;
    let count = sys::read(fd).map_err(|e| os_error("timer_read", e, "timer_read(fd)"))?;
    Ok(Value::Int(count as i64))
}

pub(super) fn builtin_poll_readable(args: &[Value]) -> Result<Value, String> {
    const SIGNATURE: &str = "poll_readable(fd, timeout_ms)";
    check_arity(args, 2, "poll_readable", SIGNATURE)?;
    let fd = arg_fd(args, "poll_readable", SIGNATURE)?;
    let timeout = arg_millis(args, 1, "poll_readable", "timeout", SIGNATURE)?;
    let ready =
        sys::poll_readable(fd, timeout).map_err(|e| os_error("poll_readable", e, SIGNATURE))?;
    Ok(Value::Bool(ready))
}

#[cfg(all(feature = "timers", target_os = "linux"))]
mod sys {
    use std::{io, os::fd::RawFd, ptr, time::Duration};

    use mio::{Events, Interest, Poll, Token, unix::SourceFd};

    fn timespec(millis: u64) -> libc::timespec {
        libc::timespec {
            tv_sec: (millis / 1000) as libc::time_t,
            tv_nsec: ((millis % 1000) * 1_000_000) as libc::c_long,
        }
    }

    pub fn create() -> io::Result<RawFd> {
        // SAFETY: timerfd_create takes no pointers.
        let fd = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(fd)
    }

    pub fn arm(fd: RawFd, initial: u64, interval: u64) -> io::Result<()> {
        let spec = libc::itimerspec {
            it_interval: timespec(interval),
            it_value: timespec(initial),
        };
        // SAFETY: `spec` outlives the call and the old value is not requested.
        let rc = unsafe { libc::timerfd_settime(fd, 0, &spec, ptr::null_mut()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn read(fd: RawFd) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        // SAFETY: `buf` is valid for 8 bytes of writes.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(u64::from_ne_bytes(buf))
    }

    pub fn poll_readable(fd: RawFd, timeout: u64) -> io::Result<bool> {
        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(1);
        poll.registry()
            .register(&mut SourceFd(&fd), Token(0), Interest::READABLE)?;
        poll.poll(&mut events, Some(Duration::from_millis(timeout)))?;
        Ok(events.iter().any(|event| event.is_readable()))
    }
}

#[cfg(not(all(feature = "timers", target_os = "linux")))]
mod sys {
    use std::io;

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "timers need Linux and the `timers` feature",
        )
    }

    pub fn create() -> io::Result<i32> {
        Err(unsupported())
    }

    pub fn arm(_fd: i32, _initial: u64, _interval: u64) -> io::Result<()> {
        Err(unsupported())
    }

    pub fn read(_fd: i32) -> io::Result<u64> {
        Err(unsupported())
    }

    pub fn poll_readable(_fd: i32, _timeout: u64) -> io::Result<bool> {
        Err(unsupported())
    }
}
