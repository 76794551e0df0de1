use std::io::Read;

use crate::error::DeployResult;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name only, without the parent path.
    pub name: String,
    pub is_dir: bool,
}

/// Output of a remote command: stdout and stderr interleaved, plus the
/// exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub status: i32,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// File operations on the remote host. Paths are absolute, `/`
/// separated.
pub trait RemoteFs {
    fn exists(&self, path: &str) -> DeployResult<bool>;

    /// List a directory. Implementations may include `.` and `..`;
    /// callers skip them.
    fn list_dir(&self, path: &str) -> DeployResult<Vec<RemoteEntry>>;

    /// Create one directory. The parent must exist.
    fn create_dir(&self, path: &str) -> DeployResult<()>;

    fn remove_file(&self, path: &str) -> DeployResult<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &str) -> DeployResult<()>;

    /// Stream `reader` into `path`, replacing any existing file.
    /// Returns the number of bytes written.
    fn upload(&self, reader: &mut dyn Read, path: &str) -> DeployResult<u64>;

    /// Rename `from` to `to`. `to` must not exist.
    fn rename(&self, from: &str, to: &str) -> DeployResult<()>;
}

/// Command execution on the remote host.
pub trait RemoteShell {
    fn exec(&self, command: &str) -> DeployResult<CommandOutput>;
}

/// An authenticated session offering both file and command access.
pub trait Remote: RemoteFs + RemoteShell {
    fn fs(&self) -> &dyn RemoteFs;
    fn shell(&self) -> &dyn RemoteShell;
}

impl<T: RemoteFs + RemoteShell> Remote for T {
    fn fs(&self) -> &dyn RemoteFs {
        self
    }

    fn shell(&self) -> &dyn RemoteShell {
        self
    }
}

/// Opens sessions on the target server.
pub trait Connector {
    /// Connect and authenticate as `user`.
    fn connect(&self, user: &str) -> DeployResult<Box<dyn Remote>>;
}

/// Create `path` and every missing ancestor.
pub fn create_dir_all(fs: &dyn RemoteFs, path: &str) -> DeployResult<()> {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        if !fs.exists(&current)? {
            fs.create_dir(&current)?;
        }
    }
    Ok(())
}

/// Build an absolute remote path from segments. Leading and trailing
/// slashes are stripped from each segment and empty segments are
/// dropped.
///
/// ```
/// use webgl_deploy::remote::join_segments;
///
/// assert_eq!(join_segments(&["/srv/", "web", "", "app/"]), "/srv/web/app");
/// assert_eq!(join_segments(&[]), "/");
/// ```
#[must_use]
pub fn join_segments(segments: &[&str]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(|s| s.trim().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", parts.join("/"))
}

/// Append one entry name to a remote directory path.
#[must_use]
pub fn child(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Quote an argument for a POSIX shell.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}
