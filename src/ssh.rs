use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::{ErrorCode, ExtendedData, Session, Sftp};

use crate::error::{DeployError, DeployResult};
use crate::remote::{CommandOutput, Connector, Remote, RemoteEntry, RemoteFs, RemoteShell};
use crate::settings::DeploySettings;

/// `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Opens key-authenticated SSH sessions on one host.
#[derive(Debug, Clone)]
pub struct SshConnector {
    host: String,
    port: u16,
    key: PathBuf,
    passphrase: Option<String>,
    timeout: Option<Duration>,
}

impl SshConnector {
    #[must_use]
    pub fn new(host: &str, key_path: &str) -> Self {
        Self {
            host: host.to_string(),
            port: 22,
            key: PathBuf::from(key_path),
            passphrase: None,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = Some(passphrase.to_string());
        self
    }

    /// Applies to the TCP connect and to every blocking SSH call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn from_settings(settings: &DeploySettings) -> Self {
        let mut connector =
            Self::new(&settings.ip_server, &settings.private_key_path).port(settings.ssh_port);
        if let Some(passphrase) = &settings.private_key_passphrase {
            connector = connector.passphrase(passphrase);
        }
        if settings.connect_timeout_secs > 0 {
            connector = connector.timeout(Duration::from_secs(settings.connect_timeout_secs));
        }
        connector
    }

    fn open_tcp(&self) -> DeployResult<TcpStream> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| DeployError::SshFailed(format!("cannot resolve {}: {e}", self.host)))?
            .next()
            .ok_or_else(|| DeployError::SshFailed(format!("no address for {}", self.host)))?;

        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        stream.map_err(|e| DeployError::SshFailed(format!("TCP connect to {addr} failed: {e}")))
    }

    /// Connect, handshake, and authenticate as `user`.
    pub fn open(&self, user: &str) -> DeployResult<SshSession> {
        if !self.key.exists() {
            return Err(DeployError::FileNotFound(self.key.display().to_string()));
        }

        let tcp = self.open_tcp()?;
        let mut session = Session::new().map_err(|e| DeployError::SshFailed(e.to_string()))?;
        if let Some(timeout) = self.timeout {
            session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        }
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| {
            DeployError::SshFailed(format!("handshake with {} failed: {e}", self.host))
        })?;

        session
            .userauth_pubkey_file(user, None, &self.key, self.passphrase.as_deref())
            .map_err(|e| {
                DeployError::SshFailed(format!(
                    "key authentication as {user}@{} failed: {e}",
                    self.host
                ))
            })?;
        if !session.authenticated() {
            return Err(DeployError::SshFailed(format!(
                "{user}@{} not authenticated",
                self.host
            )));
        }

        let sftp = session
            .sftp()
            .map_err(|e| DeployError::SshFailed(format!("SFTP subsystem unavailable: {e}")))?;

        tracing::debug!(host = %self.host, port = self.port, user, "SSH session open");
        Ok(SshSession {
            sftp,
            session,
            destination: format!("{user}@{}", self.host),
        })
    }
}

impl Connector for SshConnector {
    fn connect(&self, user: &str) -> DeployResult<Box<dyn Remote>> {
        Ok(Box::new(self.open(user)?))
    }
}

/// An authenticated SSH session with its SFTP channel.
pub struct SshSession {
    sftp: Sftp,
    session: Session,
    destination: String,
}

impl SshSession {
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl RemoteFs for SshSession {
    fn exists(&self, path: &str) -> DeployResult<bool> {
        match self.sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => Ok(false),
            Err(e) => Err(DeployError::sftp("stat", path, &e)),
        }
    }

    fn list_dir(&self, path: &str) -> DeployResult<Vec<RemoteEntry>> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|e| DeployError::sftp("readdir", path, &e))?;

        Ok(entries
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                Some(RemoteEntry {
                    name,
                    is_dir: stat.is_dir(),
                })
            })
            .collect())
    }

    fn create_dir(&self, path: &str) -> DeployResult<()> {
        self.sftp
            .mkdir(Path::new(path), 0o755)
            .map_err(|e| DeployError::sftp("mkdir", path, &e))
    }

    fn remove_file(&self, path: &str) -> DeployResult<()> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| DeployError::sftp("unlink", path, &e))
    }

    fn remove_dir(&self, path: &str) -> DeployResult<()> {
        self.sftp
            .rmdir(Path::new(path))
            .map_err(|e| DeployError::sftp("rmdir", path, &e))
    }

    fn upload(&self, reader: &mut dyn Read, path: &str) -> DeployResult<u64> {
        let mut file = self
            .sftp
            .create(Path::new(path))
            .map_err(|e| DeployError::sftp("create", path, &e))?;
        let written = std::io::copy(reader, &mut file)?;
        Ok(written)
    }

    fn rename(&self, from: &str, to: &str) -> DeployResult<()> {
        self.sftp
            .rename(Path::new(from), Path::new(to), None)
            .map_err(|e| DeployError::sftp("rename", from, &e))
    }
}

impl RemoteShell for SshSession {
    fn exec(&self, command: &str) -> DeployResult<CommandOutput> {
        let ssh_err = |e: ssh2::Error| {
            DeployError::SshFailed(format!("exec on {} failed: {e}", self.destination))
        };

        tracing::debug!(destination = %self.destination, command, "remote exec");

        let mut channel = self.session.channel_session().map_err(ssh_err)?;
        channel
            .handle_extended_data(ExtendedData::Merge)
            .map_err(ssh_err)?;
        channel.exec(command).map_err(ssh_err)?;

        let mut raw = Vec::new();
        channel.read_to_end(&mut raw)?;
        channel.wait_close().map_err(ssh_err)?;
        let status = channel.exit_status().map_err(ssh_err)?;

        Ok(CommandOutput {
            output: String::from_utf8_lossy(&raw).trim_end().to_string(),
            status,
        })
    }
}
