use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};
use crate::remote;

/// The cached object invalidated after every deploy, relative to the
/// site root.
pub const PURGE_ARTIFACT: &str = "Build/Build.data.gz";

/// Everything the tool needs to build, ship, and publish one app.
///
/// The JSON keys follow the layout of the config file written by the
/// form (`ipServer`, `deployUsername`, ...). Fields missing from the
/// file take their [`Default`] value.
///
/// # Example
///
/// ```
/// use webgl_deploy::DeploySettings;
///
/// let settings = DeploySettings {
///     deploy_root_path: "/var/www/".into(),
///     deploy_username: "deployer".into(),
///     deploy_folder: "games".into(),
///     app_name: "space-race".into(),
///     domain: "example.com".into(),
///     location: "play".into(),
///     ..DeploySettings::default()
/// };
///
/// assert_eq!(
///     settings.remote_deploy_path(),
///     "/var/www/deployer/games/space-race"
/// );
/// assert_eq!(
///     settings.purge_url(),
///     "https://example.com/play/Build/Build.data.gz"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploySettings {
    pub ip_server: String,
    pub app_name: String,
    pub deploy_username: String,
    pub deploy_root_path: String,
    pub deploy_folder: String,
    pub domain: String,
    pub location: String,
    pub private_key_path: String,
    pub build_folder_name: String,
    pub build_scene_name: String,
    #[serde(rename = "cloudFlareZone")]
    pub cloudflare_zone: String,
    #[serde(rename = "cloudFlareEmail")]
    pub cloudflare_email: String,
    #[serde(rename = "cloudFlareKey")]
    pub cloudflare_key: String,

    pub ssh_port: u16,
    pub private_key_passphrase: Option<String>,
    pub proxy_username: String,
    pub connect_timeout_secs: u64,
    pub proxy_template_path: String,
    pub build_command: String,
    pub build_target: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            ip_server: String::new(),
            app_name: String::new(),
            deploy_username: String::new(),
            deploy_root_path: String::new(),
            deploy_folder: String::new(),
            domain: String::new(),
            location: String::new(),
            private_key_path: String::new(),
            build_folder_name: String::new(),
            build_scene_name: String::new(),
            cloudflare_zone: String::new(),
            cloudflare_email: String::new(),
            cloudflare_key: String::new(),
            ssh_port: 22,
            private_key_passphrase: None,
            proxy_username: "root".to_string(),
            connect_timeout_secs: 30,
            proxy_template_path: String::new(),
            build_command: String::new(),
            build_target: "WebGL".to_string(),
        }
    }
}

/// How the site is mounted in the nginx `location` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyDirective {
    /// Site served at the domain root.
    Root,
    /// Site served under a sub-location.
    Alias,
}

impl ProxyDirective {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Alias => "alias",
        }
    }
}

impl fmt::Display for ProxyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeploySettings {
    /// `/{root}/{username}/{folder}/{appName}` with stray slashes
    /// removed from each segment.
    #[must_use]
    pub fn remote_deploy_path(&self) -> String {
        remote::join_segments(&[
            &self.deploy_root_path,
            &self.deploy_username,
            &self.deploy_folder,
            &self.app_name,
        ])
    }

    /// The sub-location without surrounding slashes, or `None` when the
    /// site lives at the domain root.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        let trimmed = self.location.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    #[must_use]
    pub fn proxy_directive(&self) -> ProxyDirective {
        if self.location().is_some() {
            ProxyDirective::Alias
        } else {
            ProxyDirective::Root
        }
    }

    fn bare_domain(&self) -> &str {
        self.domain.trim().trim_end_matches('/')
    }

    /// Public URL of the cached build artifact.
    #[must_use]
    pub fn purge_url(&self) -> String {
        match self.location() {
            None => format!("https://{}/{PURGE_ARTIFACT}", self.bare_domain()),
            Some(location) => {
                format!("https://{}/{location}/{PURGE_ARTIFACT}", self.bare_domain())
            }
        }
    }

    /// Value of the nginx `server_name` directive.
    #[must_use]
    pub fn server_names(&self) -> String {
        let domain = self.bare_domain();
        format!("{domain} www.{domain}")
    }

    /// Value of the nginx `location` prefix.
    #[must_use]
    pub fn location_prefix(&self) -> String {
        format!("/{}", self.location().unwrap_or(""))
    }

    /// Local folder the build is written to and uploaded from.
    #[must_use]
    pub fn local_build_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.build_folder_name)
    }

    /// Check the fields a remote upload needs.
    pub fn validate_for_deploy(&self) -> DeployResult<()> {
        self.validate_connection(&self.deploy_username, "deployUsername")?;
        require(&[("buildFolderName", self.build_folder_name.as_str())])?;
        self.validate_app_name()
    }

    /// Check the fields an nginx update needs.
    pub fn validate_for_proxy(&self) -> DeployResult<()> {
        self.validate_connection(&self.proxy_username, "proxyUsername")?;
        require(&[("domain", self.domain.as_str())])?;
        self.validate_app_name()
    }

    /// Check the fields a cache purge needs.
    pub fn validate_for_purge(&self) -> DeployResult<()> {
        require(&[
            ("domain", self.domain.as_str()),
            ("cloudFlareZone", self.cloudflare_zone.as_str()),
            ("cloudFlareEmail", self.cloudflare_email.as_str()),
            ("cloudFlareKey", self.cloudflare_key.as_str()),
        ])
    }

    /// Check the fields a build needs.
    pub fn validate_for_build(&self) -> DeployResult<()> {
        require(&[
            ("buildCommand", self.build_command.as_str()),
            ("buildSceneName", self.build_scene_name.as_str()),
            ("buildFolderName", self.build_folder_name.as_str()),
            ("buildTarget", self.build_target.as_str()),
        ])
    }

    fn validate_connection(&self, user: &str, user_field: &str) -> DeployResult<()> {
        require(&[
            ("ipServer", self.ip_server.as_str()),
            (user_field, user),
            ("privateKeyPath", self.private_key_path.as_str()),
        ])
    }

    fn validate_app_name(&self) -> DeployResult<()> {
        let name = self.app_name.trim();
        if name.is_empty() {
            return Err(DeployError::InvalidSettings("appName is empty".into()));
        }
        if name.contains('/') || name == "." || name == ".." {
            return Err(DeployError::InvalidSettings(format!(
                "appName must be a single path segment, got {name:?}"
            )));
        }
        Ok(())
    }

    /// Set one field by its JSON key. Used by the command line form.
    pub fn set_field(&mut self, key: &str, value: &str) -> DeployResult<()> {
        let value = value.to_string();
        match key {
            "ipServer" => self.ip_server = value,
            "appName" => self.app_name = value,
            "deployUsername" => self.deploy_username = value,
            "deployRootPath" => self.deploy_root_path = value,
            "deployFolder" => self.deploy_folder = value,
            "domain" => self.domain = value,
            "location" => self.location = value,
            "privateKeyPath" => self.private_key_path = value,
            "buildFolderName" => self.build_folder_name = value,
            "buildSceneName" => self.build_scene_name = value,
            "cloudFlareZone" => self.cloudflare_zone = value,
            "cloudFlareEmail" => self.cloudflare_email = value,
            "cloudFlareKey" => self.cloudflare_key = value,
            "sshPort" => {
                self.ssh_port = value.parse().map_err(|_| {
                    DeployError::InvalidSettings(format!("sshPort must be a port number: {value}"))
                })?;
            }
            "privateKeyPassphrase" => {
                self.private_key_passphrase = if value.is_empty() { None } else { Some(value) };
            }
            "proxyUsername" => self.proxy_username = value,
            "connectTimeoutSecs" => {
                self.connect_timeout_secs = value.parse().map_err(|_| {
                    DeployError::InvalidSettings(format!(
                        "connectTimeoutSecs must be a number of seconds: {value}"
                    ))
                })?;
            }
            "proxyTemplatePath" => self.proxy_template_path = value,
            "buildCommand" => self.build_command = value,
            "buildTarget" => self.build_target = value,
            other => {
                return Err(DeployError::InvalidSettings(format!(
                    "unknown field: {other}"
                )));
            }
        }
        Ok(())
    }

    /// Read one field by its JSON key, as shown in the form.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "ipServer" => self.ip_server.clone(),
            "appName" => self.app_name.clone(),
            "deployUsername" => self.deploy_username.clone(),
            "deployRootPath" => self.deploy_root_path.clone(),
            "deployFolder" => self.deploy_folder.clone(),
            "domain" => self.domain.clone(),
            "location" => self.location.clone(),
            "privateKeyPath" => self.private_key_path.clone(),
            "buildFolderName" => self.build_folder_name.clone(),
            "buildSceneName" => self.build_scene_name.clone(),
            "cloudFlareZone" => self.cloudflare_zone.clone(),
            "cloudFlareEmail" => self.cloudflare_email.clone(),
            "cloudFlareKey" => self.cloudflare_key.clone(),
            "sshPort" => self.ssh_port.to_string(),
            "privateKeyPassphrase" => self.private_key_passphrase.clone().unwrap_or_default(),
            "proxyUsername" => self.proxy_username.clone(),
            "connectTimeoutSecs" => self.connect_timeout_secs.to_string(),
            "proxyTemplatePath" => self.proxy_template_path.clone(),
            "buildCommand" => self.build_command.clone(),
            "buildTarget" => self.build_target.clone(),
            _ => return None,
        };
        Some(value)
    }
}

/// A labelled group of fields, in form order.
pub struct FieldGroup {
    pub title: &'static str,
    pub fields: &'static [(&'static str, &'static str)],
}

/// Form layout: `(json key, label)` per group.
pub const FIELD_GROUPS: &[FieldGroup] = &[
    FieldGroup {
        title: "Server settings",
        fields: &[
            ("ipServer", "Ip server"),
            ("sshPort", "SSH port"),
            ("deployUsername", "Deploy username"),
            ("deployRootPath", "Deploy root path"),
            ("deployFolder", "Deploy folder"),
            ("privateKeyPath", "Private key path"),
            ("privateKeyPassphrase", "Private key passphrase"),
            ("connectTimeoutSecs", "Connect timeout (s)"),
        ],
    },
    FieldGroup {
        title: "Nginx settings",
        fields: &[
            ("domain", "Domain name"),
            ("location", "Location"),
            ("proxyUsername", "Proxy username"),
            ("proxyTemplatePath", "Template path"),
        ],
    },
    FieldGroup {
        title: "Cloudflare settings",
        fields: &[
            ("cloudFlareEmail", "Email"),
            ("cloudFlareKey", "Key"),
            ("cloudFlareZone", "Zone"),
        ],
    },
    FieldGroup {
        title: "Build settings",
        fields: &[
            ("appName", "App name"),
            ("buildFolderName", "Build folder name"),
            ("buildSceneName", "Scene"),
            ("buildTarget", "Target"),
            ("buildCommand", "Build command"),
        ],
    },
];

/// Fields whose values are masked when printed.
pub const SECRET_FIELDS: &[&str] = &["cloudFlareKey", "privateKeyPassphrase"];

fn require(fields: &[(&str, &str)]) -> DeployResult<()> {
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(DeployError::InvalidSettings(format!("{name} is empty")));
        }
    }
    Ok(())
}

/// Why the settings file could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailure {
    /// No file at the path yet.
    Missing,
    /// The file exists but could not be read.
    Unreadable,
    /// The file was read but is not a valid settings record.
    Unparsable,
}

/// Result of reading the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(DeploySettings),
    /// The file was missing or unreadable; `settings` is all-default.
    Defaulted {
        settings: DeploySettings,
        failure: LoadFailure,
        reason: String,
    },
}

impl LoadOutcome {
    #[must_use]
    pub fn settings(&self) -> &DeploySettings {
        match self {
            Self::Loaded(settings) | Self::Defaulted { settings, .. } => settings,
        }
    }

    #[must_use]
    pub fn into_settings(self) -> DeploySettings {
        match self {
            Self::Loaded(settings) | Self::Defaulted { settings, .. } => settings,
        }
    }
}

/// Reads and writes [`DeploySettings`] as a JSON file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings, falling back to defaults when the file is
    /// missing or does not parse. The fallback is reported through
    /// [`LoadOutcome::Defaulted`].
    #[must_use]
    pub fn load(&self) -> LoadOutcome {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                let failure = if e.kind() == std::io::ErrorKind::NotFound {
                    LoadFailure::Missing
                } else {
                    LoadFailure::Unreadable
                };
                tracing::debug!(path = %self.path.display(), error = %e, "using default settings");
                return LoadOutcome::Defaulted {
                    settings: DeploySettings::default(),
                    failure,
                    reason: format!("cannot read {}: {e}", self.path.display()),
                };
            }
        };

        match serde_json::from_str::<DeploySettings>(&raw) {
            Ok(settings) => LoadOutcome::Loaded(settings),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "using default settings");
                LoadOutcome::Defaulted {
                    settings: DeploySettings::default(),
                    failure: LoadFailure::Unparsable,
                    reason: format!("cannot parse {}: {e}", self.path.display()),
                }
            }
        }
    }

    /// Load the settings as the base for an edit that will be saved.
    ///
    /// A missing file starts from defaults. A file that exists but cannot
    /// be read or parsed is an error, so saving never overwrites values
    /// that were only unreadable.
    pub fn load_for_edit(&self) -> DeployResult<DeploySettings> {
        match self.load() {
            LoadOutcome::Loaded(settings)
            | LoadOutcome::Defaulted {
                settings,
                failure: LoadFailure::Missing,
                ..
            } => Ok(settings),
            LoadOutcome::Defaulted { reason, .. } => Err(DeployError::InvalidSettings(format!(
                "{reason}; fix or remove {} before editing",
                self.path.display()
            ))),
        }
    }

    /// Set one field on the stored record and save it.
    pub fn update_field(&self, key: &str, value: &str) -> DeployResult<DeploySettings> {
        let mut settings = self.load_for_edit()?;
        settings.set_field(key, value)?;
        self.save(&settings)?;
        Ok(settings)
    }

    /// Overwrite the file with the full record. The new content is
    /// written to a temporary file next to the target and renamed over
    /// it.
    pub fn save(&self, settings: &DeploySettings) -> DeployResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut content = serde_json::to_string_pretty(settings)?;
        content.push('\n');

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| DeployError::Io(e.error))?;

        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}
