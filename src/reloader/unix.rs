//! Process replacement on unix: descriptor inheritance and the readiness socket.
//!
//! ```text
//! parent                                   successor
//! ──────                                   ─────────
//! snapshot sockets
//! socketpair(parent_end, child_end)
//! stage dups at fd >= 3+n+1 (CLOEXEC)
//! spawn current_exe ── pre_exec: dup2 ──►  fd 3..3+n   listeners
//!                                          fd 3+n      readiness socket
//! read 1 byte  ◄──────────────────────────  ready(): write [1]
//!   └─ or child exit / timeout / stop
//! keep parent_end open until exit ───────► wait_for_parent(): EOF
//! ```

use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::error::{ReloadError, UpgradeError};
use crate::reloader::handoff::{Handoff, HandoffListener, FIRST_FD, HANDOFF_ENV};
use crate::reloader::listener::{Network, StdListener};
use crate::reloader::registry::{ListenerKey, Snapshot};

/// This process's end of the readiness socket shared with its parent.
#[derive(Debug)]
pub(super) struct ParentLink(UnixStream);

impl ParentLink {
    /// Tells the parent this process is ready.
    pub(super) fn notify(&self) -> io::Result<()> {
        (&self.0).write_all(&[1])
    }

    /// Resolves once the parent closed its end, i.e. exited.
    pub(super) async fn closed(&self) -> io::Result<()> {
        let stream = self.0.try_clone()?;
        stream.set_nonblocking(true)?;
        let mut stream = tokio::net::UnixStream::from_std(stream)?;

        let mut buf = [0u8; 16];
        while stream.read(&mut buf).await? != 0 {}
        Ok(())
    }
}

/// Takes ownership of the descriptors described by `handoff`.
pub(super) fn inherit(handoff: &Handoff) -> Result<(Vec<Snapshot>, ParentLink), ReloadError> {
    let mut sockets = Vec::with_capacity(handoff.listeners.len());
    for l in &handoff.listeners {
        sockets.push(Snapshot {
            key: ListenerKey::new(l.network, l.address.as_str()),
            socket: adopt_listener(l)?,
            generation: l.generation,
        });
    }
    let link = UnixStream::from(adopt_fd(handoff.ready_fd)?);
    Ok((sockets, ParentLink(link)))
}

fn adopt_listener(l: &HandoffListener) -> Result<StdListener, ReloadError> {
    let fd = adopt_fd(l.fd)?;
    Ok(match l.network {
        Network::Unix => StdListener::Unix(UnixListener::from(fd)),
        _ => StdListener::Tcp(std::net::TcpListener::from(fd)),
    })
}

/// Claims an inherited descriptor and hides it from our own future children.
fn adopt_fd(fd: RawFd) -> Result<OwnedFd, ReloadError> {
    // SAFETY: fcntl on an arbitrary integer only inspects the descriptor table.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(ReloadError::Handoff {
            reason: format!("descriptor {fd} is not open: {}", io::Error::last_os_error()),
        });
    }
    // SAFETY: the descriptor is open and was passed to us for exclusive ownership.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    // SAFETY: `owned` is a valid open descriptor.
    if unsafe { libc::fcntl(owned.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(owned)
}

/// A spawned successor and the parent end of its readiness socket.
#[derive(Debug)]
pub(super) struct Successor {
    child: Child,
    channel: tokio::net::UnixStream,
}

impl Successor {
    /// Re-executes `executable` (default: the current binary) with the same
    /// arguments, passing `sockets`.
    pub(super) fn spawn(
        sockets: &[Snapshot],
        generation: u64,
        executable: Option<&Path>,
    ) -> Result<Self, UpgradeError> {
        let (parent_end, child_end) = UnixStream::pair()?;

        let n = sockets.len() as i32;
        let floor = FIRST_FD + n + 1;
        let mut staged = Vec::with_capacity(sockets.len() + 1);
        for fd in sockets
            .iter()
            .map(|s| s.socket.as_raw_fd())
            .chain(std::iter::once(child_end.as_raw_fd()))
        {
            staged.push(dup_above(fd, floor)?);
        }

        let handoff = Handoff {
            generation,
            parent_pid: std::process::id(),
            ready_fd: FIRST_FD + n,
            listeners: sockets
                .iter()
                .zip(FIRST_FD..)
                .map(|(s, fd)| HandoffListener {
                    fd,
                    network: s.key.network,
                    address: s.key.address.clone(),
                    generation: s.generation,
                })
                .collect(),
        };
        let encoded = handoff.encode().map_err(|e| UpgradeError::Spawn(io::Error::other(e)))?;

        let program = match executable {
            Some(path) => path.to_path_buf(),
            None => std::env::current_exe().map_err(UpgradeError::Spawn)?,
        };
        let mut cmd = Command::new(program);
        cmd.args(std::env::args_os().skip(1))
            .env(HANDOFF_ENV, encoded)
            .stdin(Stdio::null());

        let raw: Vec<RawFd> = staged.iter().map(AsRawFd::as_raw_fd).collect();
        // SAFETY: the closure only calls dup2, which is async-signal-safe, and does not allocate.
        unsafe {
            cmd.pre_exec(move || {
                for (target, &fd) in (FIRST_FD..).zip(raw.iter()) {
                    if libc::dup2(fd, target) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(UpgradeError::Spawn)?;
        drop(staged);
        drop(child_end);

        parent_end.set_nonblocking(true)?;
        let channel = tokio::net::UnixStream::from_std(parent_end)?;
        Ok(Self { child, channel })
    }

    pub(super) fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Waits for the readiness byte; the successor exiting first is an error.
    pub(super) async fn ready(&mut self) -> Result<(), UpgradeError> {
        let mut byte = [0u8; 1];
        tokio::select! {
            biased;
            read = self.channel.read(&mut byte) => match read? {
                1 => Ok(()),
                _ => {
                    let status = self.child.wait().await?;
                    Err(UpgradeError::ChildExited { status: status.to_string() })
                }
            },
            status = self.child.wait() => Err(UpgradeError::ChildExited {
                status: status?.to_string(),
            }),
        }
    }

    /// Kills a successor that failed to become ready and reaps it in the background.
    pub(super) fn abandon(mut self) {
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(error = %err, "successor already gone");
        }
        tokio::spawn(async move {
            let _ = self.child.wait().await;
        });
    }
}

fn dup_above(fd: RawFd, floor: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: F_DUPFD_CLOEXEC returns a fresh descriptor we own, or -1.
    let dup = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, floor) };
    if dup == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `dup` was just created and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(dup) })
}
