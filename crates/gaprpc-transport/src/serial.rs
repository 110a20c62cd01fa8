use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Default line rate of the connectivity firmware.
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

const NO_TIMEOUT: i32 = -1;

/// Line settings for a serial link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Baud rate. Default: 1 000 000.
    pub baud_rate: u32,
    /// RTS/CTS hardware flow control. Default: on.
    pub flow_control: bool,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            flow_control: true,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// A serial tty in raw mode (8N1, no echo, no line discipline).
///
/// Timeouts are implemented with `poll(2)` so a timed-out read never
/// consumes bytes.
pub struct SerialPort {
    file: File,
    path: PathBuf,
    read_timeout_ms: AtomicI32,
    write_timeout_ms: AtomicI32,
}

impl SerialPort {
    /// Open and configure the tty at `path`.
    pub fn open(path: impl AsRef<Path>, config: &LinkConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = baud_to_speed(config.baud_rate)?;

        // O_NONBLOCK so the open does not hang waiting for carrier detect.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let fd = file.as_raw_fd();
        configure_raw(fd, speed, config.flow_control).map_err(|source| {
            TransportError::Configure {
                path: path.clone(),
                source,
            }
        })?;

        info!(
            ?path,
            baud = config.baud_rate,
            flow_control = config.flow_control,
            "serial link opened"
        );

        let port = Self {
            file,
            path,
            read_timeout_ms: AtomicI32::new(NO_TIMEOUT),
            write_timeout_ms: AtomicI32::new(NO_TIMEOUT),
        };
        port.set_read_timeout(config.read_timeout);
        port.set_write_timeout(config.write_timeout);
        Ok(port)
    }

    /// Device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set the read timeout (`None` blocks indefinitely).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        self.read_timeout_ms
            .store(timeout_to_poll_ms(timeout), Ordering::Relaxed);
    }

    /// Set the write timeout (`None` blocks indefinitely).
    pub fn set_write_timeout(&self, timeout: Option<Duration>) {
        self.write_timeout_ms
            .store(timeout_to_poll_ms(timeout), Ordering::Relaxed);
    }

    /// Duplicate the descriptor; timeouts are copied, not shared.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            read_timeout_ms: AtomicI32::new(self.read_timeout_ms.load(Ordering::Relaxed)),
            write_timeout_ms: AtomicI32::new(self.write_timeout_ms.load(Ordering::Relaxed)),
        })
    }

    fn wait_ready(&self, events: libc::c_short, timeout_ms: i32) -> io::Result<()> {
        if timeout_ms == NO_TIMEOUT {
            return Ok(());
        }
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events,
            revents: 0,
        };
        // SAFETY: `pfd` is a valid pollfd for the duration of the call and nfds is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        match rc {
            0 => Err(io::Error::from(io::ErrorKind::TimedOut)),
            n if n < 0 => Err(io::Error::last_os_error()),
            _ => Ok(()),
        }
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.wait_ready(libc::POLLIN, self.read_timeout_ms.load(Ordering::Relaxed))?;
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.wait_ready(libc::POLLOUT, self.write_timeout_ms.load(Ordering::Relaxed))?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn timeout_to_poll_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => NO_TIMEOUT,
        Some(d) => d.as_millis().clamp(1, i32::MAX as u128) as i32,
    }
}

fn configure_raw(fd: libc::c_int, speed: libc::speed_t, flow_control: bool) -> io::Result<()> {
    // Back to blocking I/O now that the open has returned.
    // SAFETY: `fd` is an open descriptor owned by the caller.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above; only the O_NONBLOCK bit is cleared.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut tty = std::mem::MaybeUninit::<libc::termios>::uninit();
    // SAFETY: tcgetattr fully initializes `tty` on success.
    if unsafe { libc::tcgetattr(fd, tty.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: initialized by the successful tcgetattr above.
    let mut tty = unsafe { tty.assume_init() };

    // SAFETY: `tty` is a valid termios value.
    unsafe {
        libc::cfmakeraw(&mut tty);
        if libc::cfsetispeed(&mut tty, speed) != 0 || libc::cfsetospeed(&mut tty, speed) != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    tty.c_cflag |= libc::CLOCAL | libc::CREAD;
    if flow_control {
        tty.c_cflag |= libc::CRTSCTS;
    } else {
        tty.c_cflag &= !libc::CRTSCTS;
    }
    tty.c_cc[libc::VMIN] = 1;
    tty.c_cc[libc::VTIME] = 0;

    // SAFETY: `tty` is a valid termios value and `fd` is open.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tty) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` is open; discards bytes queued before configuration.
    if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0 {
        return Err(io::Error::last_os_error());
    }
    debug!(fd, "tty configured raw");
    Ok(())
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        other => return Err(TransportError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_baud_rates_are_supported() {
        for baud in [9_600, 19_200, 38_400, 57_600, 115_200, 230_400] {
            assert!(baud_to_speed(baud).is_ok(), "baud {baud}");
        }
    }

    #[test]
    fn odd_baud_rate_is_rejected() {
        assert!(matches!(
            baud_to_speed(12_345),
            Err(TransportError::UnsupportedBaudRate(12_345))
        ));
    }

    #[test]
    fn poll_timeout_conversion() {
        assert_eq!(timeout_to_poll_ms(None), NO_TIMEOUT);
        assert_eq!(timeout_to_poll_ms(Some(Duration::from_millis(250))), 250);
        assert_eq!(timeout_to_poll_ms(Some(Duration::ZERO)), 1);
        assert_eq!(timeout_to_poll_ms(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }

    #[test]
    fn missing_device_reports_open_error() {
        let path = std::env::temp_dir().join(format!("gaprpc-no-tty-{}", std::process::id()));
        let err = SerialPort::open(&path, &LinkConfig::default()).err().unwrap();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use std::os::fd::FromRawFd;

        use super::*;

        fn open_pty() -> (File, PathBuf) {
            // SAFETY: plain libc calls on a descriptor we own; ptsname_r writes
            // at most `name.len()` bytes including the terminator.
            unsafe {
                let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
                assert!(master >= 0, "posix_openpt failed");
                assert_eq!(libc::grantpt(master), 0);
                assert_eq!(libc::unlockpt(master), 0);
                let mut name = [0 as libc::c_char; 128];
                assert_eq!(libc::ptsname_r(master, name.as_mut_ptr(), name.len()), 0);
                let path = std::ffi::CStr::from_ptr(name.as_ptr())
                    .to_string_lossy()
                    .into_owned();
                (File::from_raw_fd(master), PathBuf::from(path))
            }
        }

        fn no_flow_control() -> LinkConfig {
            LinkConfig {
                baud_rate: 115_200,
                flow_control: false,
                ..LinkConfig::default()
            }
        }

        #[test]
        fn raw_bytes_pass_through_pty() {
            let (mut master, slave_path) = open_pty();
            let mut port = SerialPort::open(&slave_path, &no_flow_control()).unwrap();
            assert_eq!(port.path(), slave_path.as_path());

            master.write_all(&[0x00, 0x0A, 0x0D, 0xFF]).unwrap();
            let mut buf = [0u8; 4];
            port.read_exact(&mut buf).unwrap();
            assert_eq!(buf, [0x00, 0x0A, 0x0D, 0xFF]);

            port.write_all(b"ok\n").unwrap();
            let mut back = [0u8; 3];
            master.read_exact(&mut back).unwrap();
            assert_eq!(&back, b"ok\n");
        }

        #[test]
        fn read_timeout_does_not_consume_bytes() {
            let (mut master, slave_path) = open_pty();
            let mut port = SerialPort::open(&slave_path, &no_flow_control()).unwrap();
            port.set_read_timeout(Some(Duration::from_millis(20)));

            let mut buf = [0u8; 1];
            let err = port.read(&mut buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::TimedOut);

            master.write_all(&[0x42]).unwrap();
            port.read_exact(&mut buf).unwrap();
            assert_eq!(buf[0], 0x42);
        }
    }
}
