//! Index server for the IPC driver
//!
//! A daemon keeps one index in memory and answers framed binary requests on a
//! Unix socket. The client side lives in [`client`]; when no server is
//! listening, the IPC driver falls back to an in-process buffer instead.

pub mod client;
pub mod daemon;
pub mod protocol;

pub use client::IndexClient;
pub use daemon::IndexServer;

use std::path::PathBuf;

fn runtime_file(name: &str, ext: &str) -> PathBuf {
    // Try XDG_RUNTIME_DIR first (most secure, tmpfs-backed)
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(format!("{}.{}", name, ext));
    }

    // Fall back to user's home directory
    if let Some(home) = dirs::home_dir() {
        return home.join(".local").join("run").join(format!("{}.{}", name, ext));
    }

    // Last resort: /tmp with user ID
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}.{}", name, uid, ext))
}

/// Default socket path of the index server, in a per-user runtime directory
pub fn get_socket_path() -> PathBuf {
    runtime_file("fts", "sock")
}

/// PID file written by a foreground server
pub fn get_pid_path() -> PathBuf {
    runtime_file("fts", "pid")
}

/// Check if a recorded server process is alive
pub fn is_server_running() -> bool {
    let Ok(pid_str) = std::fs::read_to_string(get_pid_path()) else {
        return false;
    };
    match pid_str.trim().parse::<i32>() {
        // kill(pid, 0) probes for existence without signalling
        Ok(pid) => unsafe { libc::kill(pid, 0) == 0 },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_names() {
        let socket = get_socket_path();
        let name = socket.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("fts"));
        assert!(name.ends_with(".sock"));
        assert_eq!(get_pid_path().extension().unwrap(), "pid");
    }
}
