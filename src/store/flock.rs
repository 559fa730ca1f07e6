//! Advisory file locks on the registry lock file

use std::io;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Acquire an exclusive `flock` on `file`, blocking until it is available.
///
/// The lock belongs to the open file description and is released when the
/// file is closed. Only processes that take the same lock are excluded.
///
/// On non-Unix platforms this is a no-op.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn acquire_exclusive_blocking(file: &std::fs::File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    loop {
        // SAFETY: `fd` comes from an open `std::fs::File` that outlives this
        // call, and `LOCK_EX` is a valid `flock` operation.
        let rc = unsafe { libc::flock(fd, libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
pub fn acquire_exclusive_blocking(_: &std::fs::File) -> io::Result<()> {
    Ok(())
}

/// Try to acquire an exclusive `flock` on `file` without blocking.
///
/// Returns `Ok(false)` when another open file description holds the lock.
#[cfg(all(unix, test))]
#[allow(unsafe_code)]
pub fn try_acquire_exclusive(file: &std::fs::File) -> io::Result<bool> {
    let fd = file.as_raw_fd();
    // SAFETY: as above; `LOCK_NB` only changes blocking behaviour.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

#[cfg(all(not(unix), test))]
pub fn try_acquire_exclusive(_: &std::fs::File) -> io::Result<bool> {
    Ok(true)
}
