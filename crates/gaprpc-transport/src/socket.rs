use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Connect to a Unix domain socket bridge (pty relay, firmware simulator).
pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref().to_path_buf();

    let path_bytes = path.as_os_str().len();
    if path_bytes >= MAX_PATH_LEN {
        return Err(TransportError::Connect {
            path,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("socket path too long ({path_bytes} bytes, max {MAX_PATH_LEN})"),
            ),
        });
    }

    // Refuse to dial something that exists but is not a socket.
    if let Ok(metadata) = std::fs::metadata(&path) {
        if !metadata.file_type().is_socket() {
            debug!(?path, "bridge path is not a socket");
            return Err(TransportError::Connect {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "existing path is not a unix socket",
                ),
            });
        }
    }

    let stream = UnixStream::connect(&path).map_err(|source| TransportError::Connect {
        path: path.clone(),
        source,
    })?;
    info!(?path, "socket bridge connected");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;

    use super::*;
    use crate::addr::LinkAddr;
    use crate::serial::LinkConfig;
    use crate::traits::LinkStream;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("gaprpc-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn connects_to_listening_bridge() {
        let dir = temp_dir("bridge");
        let sock_path = dir.join("radio.sock");
        let _ = std::fs::remove_file(&sock_path);
        let listener = UnixListener::bind(&sock_path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let addr = LinkAddr::Unix(sock_path.clone());
        let mut link = LinkStream::open(&addr, &LinkConfig::default()).unwrap();
        link.write_all(b"abc").unwrap();
        let mut echo = [0u8; 3];
        link.read_exact(&mut echo).unwrap();
        assert_eq!(&echo, b"abc");

        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_bridge_is_connect_error() {
        let dir = temp_dir("nobridge");
        let err = connect(dir.join("absent.sock")).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn regular_file_is_not_dialed() {
        let dir = temp_dir("notsock");
        let file_path = dir.join("plain");
        std::fs::write(&file_path, b"x").unwrap();

        let err = connect(&file_path).unwrap_err();
        assert!(
            matches!(err, TransportError::Connect { source, .. } if source.kind() == std::io::ErrorKind::InvalidInput)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn overlong_path_is_rejected() {
        let long = std::path::PathBuf::from(format!("/tmp/{}", "x".repeat(MAX_PATH_LEN)));
        assert!(matches!(
            connect(long),
            Err(TransportError::Connect { .. })
        ));
    }
}
