//! In-memory stand-ins for the remote server, used by the transfer,
//! proxy, and pipeline tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use webgl_deploy::DeploySettings;
use webgl_deploy::error::{DeployError, DeployResult};
use webgl_deploy::remote::{CommandOutput, Connector, Remote, RemoteEntry, RemoteFs, RemoteShell};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct State {
    /// Every path except `/`, which always exists.
    pub nodes: BTreeMap<String, Node>,
    /// Mutating operations in call order, e.g. `rmdir /a`.
    pub ops: Vec<String>,
    /// `(user, command)` per exec.
    pub commands: Vec<(String, String)>,
    /// Users that opened a session, in order.
    pub connects: Vec<String>,
    pub list_dots: bool,
    /// Fail the upload with this 0-based index.
    pub fail_upload_at: Option<usize>,
    pub uploads: usize,
    pub fail_connect: bool,
    pub exec_status: i32,
    pub exec_output: String,
}

fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
    }
}

fn fail(message: String) -> DeployError {
    DeployError::Other(message)
}

#[derive(Clone, Default)]
pub struct MemoryServer {
    pub state: Rc<RefCell<State>>,
}

impl MemoryServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mkdirs(&self, path: &str) {
        let mut state = self.state.borrow_mut();
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            state.nodes.entry(current.clone()).or_insert(Node::Dir);
        }
    }

    pub fn put_file(&self, path: &str, content: &[u8]) {
        self.mkdirs(&parent(path));
        self.state
            .borrow_mut()
            .nodes
            .insert(path.to_string(), Node::File(content.to_vec()));
    }

    #[must_use]
    pub fn session(&self, user: &str) -> MemorySession {
        MemorySession {
            state: Rc::clone(&self.state),
            user: user.to_string(),
        }
    }

    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            state: Rc::clone(&self.state),
        }
    }

    /// Paths and nodes at or below `root`.
    #[must_use]
    pub fn tree(&self, root: &str) -> BTreeMap<String, Node> {
        let prefix = format!("{root}/");
        self.state
            .borrow()
            .nodes
            .iter()
            .filter(|(k, _)| *k == root || k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.borrow().nodes.get(path) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        self.state.borrow().nodes.contains_key(path)
    }

    #[must_use]
    pub fn ops(&self) -> Vec<String> {
        self.state.borrow().ops.clone()
    }

    #[must_use]
    pub fn connects(&self) -> Vec<String> {
        self.state.borrow().connects.clone()
    }

    #[must_use]
    pub fn commands(&self) -> Vec<(String, String)> {
        self.state.borrow().commands.clone()
    }
}

pub struct MemorySession {
    state: Rc<RefCell<State>>,
    user: String,
}

impl MemorySession {
    fn is_dir(state: &State, path: &str) -> bool {
        path == "/" || matches!(state.nodes.get(path), Some(Node::Dir))
    }

    fn children(state: &State, dir: &str) -> Vec<String> {
        state
            .nodes
            .keys()
            .filter(|k| parent(k) == dir)
            .cloned()
            .collect()
    }
}

impl RemoteFs for MemorySession {
    fn exists(&self, path: &str) -> DeployResult<bool> {
        let state = self.state.borrow();
        Ok(path == "/" || state.nodes.contains_key(path))
    }

    fn list_dir(&self, path: &str) -> DeployResult<Vec<RemoteEntry>> {
        let state = self.state.borrow();
        if !Self::is_dir(&state, path) {
            return Err(fail(format!("not a directory: {path}")));
        }

        let mut entries = Vec::new();
        if state.list_dots {
            for dot in [".", ".."] {
                entries.push(RemoteEntry {
                    name: dot.to_string(),
                    is_dir: true,
                });
            }
        }
        for child in Self::children(&state, path) {
            let is_dir = matches!(state.nodes.get(&child), Some(Node::Dir));
            let name = child.rsplit('/').next().unwrap_or_default().to_string();
            entries.push(RemoteEntry { name, is_dir });
        }
        Ok(entries)
    }

    fn create_dir(&self, path: &str) -> DeployResult<()> {
        let mut state = self.state.borrow_mut();
        if !Self::is_dir(&state, &parent(path)) {
            return Err(fail(format!("no parent for {path}")));
        }
        if state.nodes.contains_key(path) {
            return Err(fail(format!("already exists: {path}")));
        }
        state.nodes.insert(path.to_string(), Node::Dir);
        state.ops.push(format!("mkdir {path}"));
        Ok(())
    }

    fn remove_file(&self, path: &str) -> DeployResult<()> {
        let mut state = self.state.borrow_mut();
        match state.nodes.get(path) {
            Some(Node::File(_)) => {
                state.nodes.remove(path);
                state.ops.push(format!("rm {path}"));
                Ok(())
            }
            _ => Err(fail(format!("not a file: {path}"))),
        }
    }

    fn remove_dir(&self, path: &str) -> DeployResult<()> {
        let mut state = self.state.borrow_mut();
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(fail(format!("not a directory: {path}")));
        }
        if !Self::children(&state, path).is_empty() {
            return Err(fail(format!("directory not empty: {path}")));
        }
        state.nodes.remove(path);
        state.ops.push(format!("rmdir {path}"));
        Ok(())
    }

    fn upload(&self, reader: &mut dyn Read, path: &str) -> DeployResult<u64> {
        let mut state = self.state.borrow_mut();
        if state.fail_upload_at == Some(state.uploads) {
            return Err(DeployError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection dropped",
            )));
        }
        if !Self::is_dir(&state, &parent(path)) {
            return Err(fail(format!("no parent for {path}")));
        }
        if matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(fail(format!("is a directory: {path}")));
        }

        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        let len = content.len() as u64;
        state.nodes.insert(path.to_string(), Node::File(content));
        state.uploads += 1;
        state.ops.push(format!("put {path}"));
        Ok(len)
    }

    fn rename(&self, from: &str, to: &str) -> DeployResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.nodes.contains_key(from) {
            return Err(fail(format!("no such path: {from}")));
        }
        if state.nodes.contains_key(to) {
            return Err(fail(format!("target exists: {to}")));
        }
        if !Self::is_dir(&state, &parent(to)) {
            return Err(fail(format!("no parent for {to}")));
        }

        let prefix = format!("{from}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| *k == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = state.nodes.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                state.nodes.insert(new, node);
            }
        }
        state.ops.push(format!("mv {from} {to}"));
        Ok(())
    }
}

impl RemoteShell for MemorySession {
    fn exec(&self, command: &str) -> DeployResult<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state
            .commands
            .push((self.user.clone(), command.to_string()));
        Ok(CommandOutput {
            output: state.exec_output.clone(),
            status: state.exec_status,
        })
    }
}

pub struct MemoryConnector {
    state: Rc<RefCell<State>>,
}

impl Connector for MemoryConnector {
    fn connect(&self, user: &str) -> DeployResult<Box<dyn Remote>> {
        let mut state = self.state.borrow_mut();
        if state.fail_connect {
            return Err(DeployError::SshFailed(format!("{user}@memory unreachable")));
        }
        state.connects.push(user.to_string());
        Ok(Box::new(MemorySession {
            state: Rc::clone(&self.state),
            user: user.to_string(),
        }))
    }
}

/// Write files (and empty directories, given with a trailing `/`)
/// under `root`.
pub fn write_tree(root: &Path, entries: &[(&str, &str)]) {
    for (path, content) in entries {
        let full = root.join(path.trim_end_matches('/'));
        if path.ends_with('/') {
            fs::create_dir_all(&full).expect("create dir");
        } else {
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&full, content).expect("write file");
        }
    }
}

/// A record with every field an action needs.
#[must_use]
pub fn full_settings() -> DeploySettings {
    DeploySettings {
        ip_server: "203.0.113.10".into(),
        app_name: "space-race".into(),
        deploy_username: "deployer".into(),
        deploy_root_path: "var/www".into(),
        deploy_folder: "games".into(),
        domain: "example.com".into(),
        location: String::new(),
        private_key_path: "/home/dev/.ssh/id_ed25519".into(),
        build_folder_name: "Build".into(),
        build_scene_name: "Assets/Scenes/Main.unity".into(),
        cloudflare_zone: "zone123".into(),
        cloudflare_email: "ops@example.com".into(),
        cloudflare_key: "cf-key".into(),
        build_command: "true".into(),
        ..DeploySettings::default()
    }
}
