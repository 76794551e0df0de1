use std::fs::{DirEntry, File, read_dir};
use std::path::Path;

use crate::error::{DeployError, DeployResult};
use crate::remote::{self, Connector, RemoteFs};
use crate::settings::DeploySettings;

/// Suffix of the directory a new build is uploaded into before it goes
/// live.
pub const STAGING_SUFFIX: &str = ".incoming";

/// Suffix the live directory is moved to while the new build is swapped
/// in.
pub const PREVIOUS_SUFFIX: &str = ".previous";

/// What a mirror run uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

impl MirrorStats {
    const fn absorb(&mut self, other: Self) {
        self.files += other.files;
        self.dirs += other.dirs;
        self.bytes += other.bytes;
    }
}

/// Remove `path` and everything below it, depth first.
pub fn delete_tree(fs: &dyn RemoteFs, path: &str) -> DeployResult<()> {
    for entry in fs.list_dir(path)? {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        let child = remote::child(path, &entry.name);
        if entry.is_dir {
            delete_tree(fs, &child)?;
        } else {
            fs.remove_file(&child)?;
        }
    }
    fs.remove_dir(path)
}

/// Copy the contents of `local` into the existing remote directory
/// `remote_dir`. Subdirectories are created when missing and files are
/// overwritten. Entries are visited in name order and symlinks are
/// uploaded as their targets.
pub fn mirror_directory(
    fs: &dyn RemoteFs,
    local: &Path,
    remote_dir: &str,
) -> DeployResult<MirrorStats> {
    let mut entries = read_dir(local)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(DirEntry::file_name);

    let mut stats = MirrorStats::default();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let target = remote::child(remote_dir, &name);

        if entry.path().is_dir() {
            if !fs.exists(&target)? {
                fs.create_dir(&target)?;
            }
            stats.dirs += 1;
            stats.absorb(mirror_directory(fs, &entry.path(), &target)?);
        } else {
            let mut file = File::open(entry.path())?;
            let bytes = fs.upload(&mut file, &target)?;
            tracing::debug!(file = %target, bytes, "uploaded");
            stats.files += 1;
            stats.bytes += bytes;
        }
    }

    Ok(stats)
}

/// Replace the remote directory `remote_path` with the contents of
/// `local`.
///
/// The build is uploaded next to the live directory and only swapped in
/// once every file is on the server, so an interrupted upload leaves the
/// live site as it was.
pub fn publish(fs: &dyn RemoteFs, local: &Path, remote_path: &str) -> DeployResult<MirrorStats> {
    if !local.is_dir() {
        return Err(DeployError::FileNotFound(format!(
            "build folder {}",
            local.display()
        )));
    }

    let staging = format!("{remote_path}{STAGING_SUFFIX}");
    let previous = format!("{remote_path}{PREVIOUS_SUFFIX}");

    if fs.exists(&staging)? {
        eprintln!("  Removing leftover {staging}");
        delete_tree(fs, &staging)?;
    }
    remote::create_dir_all(fs, &staging)?;

    eprintln!("  Uploading {} -> {staging}", local.display());
    let stats = mirror_directory(fs, local, &staging)?;

    if fs.exists(remote_path)? {
        if fs.exists(&previous)? {
            delete_tree(fs, &previous)?;
        }
        fs.rename(remote_path, &previous)?;
    }
    fs.rename(&staging, remote_path)?;

    if fs.exists(&previous)? {
        eprintln!("  Removing replaced build");
        delete_tree(fs, &previous)?;
    }

    Ok(stats)
}

/// Upload the local build folder to the deploy path of `settings`,
/// authenticating as the deploy user.
pub fn deploy(
    connector: &dyn Connector,
    settings: &DeploySettings,
    project_dir: &Path,
) -> DeployResult<MirrorStats> {
    settings.validate_for_deploy()?;

    let local = settings.local_build_dir(project_dir);
    let remote_path = settings.remote_deploy_path();

    eprintln!(
        "Deploying {} to {}@{}:{remote_path}",
        local.display(),
        settings.deploy_username,
        settings.ip_server
    );

    let session = connector.connect(&settings.deploy_username)?;
    let stats = publish(session.fs(), &local, &remote_path)?;

    eprintln!(
        "  Uploaded {} files in {} directories ({} bytes)",
        stats.files, stats.dirs, stats.bytes
    );
    Ok(stats)
}
