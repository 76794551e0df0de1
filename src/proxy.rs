use std::fs;
use std::path::Path;

use crate::error::{DeployError, DeployResult};
use crate::remote::{self, Connector};
use crate::settings::DeploySettings;

pub const SERVER_NAME: &str = "*SERVER_NAME";
pub const LOCATION: &str = "*LOCATION";
pub const BUILD_PATH: &str = "*BUILD_PATH";
pub const ALIAS_ROOT: &str = "*ALIAS_ROOT";

pub const PLACEHOLDERS: [&str; 4] = [SERVER_NAME, LOCATION, BUILD_PATH, ALIAS_ROOT];

/// Site definition used when no template path is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/nginx.conf");

pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";
pub const RELOAD_COMMAND: &str = "/etc/init.d/nginx reload";

/// Read the configured template, or the built-in one.
pub fn load_template(settings: &DeploySettings) -> DeployResult<String> {
    let path = settings.proxy_template_path.trim();
    if path.is_empty() {
        return Ok(DEFAULT_TEMPLATE.to_string());
    }
    if !Path::new(path).exists() {
        return Err(DeployError::FileNotFound(format!("nginx template {path}")));
    }
    Ok(fs::read_to_string(path)?)
}

/// Reject values that would change the structure of the rendered
/// config instead of filling a slot.
fn check_value(placeholder: &str, value: &str) -> DeployResult<()> {
    let unsafe_char = |c: char| {
        c.is_whitespace() || c.is_control() || matches!(c, ';' | '{' | '}' | '"' | '\'' | '\\')
    };
    if PLACEHOLDERS.iter().any(|p| value.contains(p)) || value.chars().any(unsafe_char) {
        return Err(DeployError::PlaceholderCollision {
            placeholder: placeholder.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Fill the four placeholders of `template` from `settings`.
///
/// # Example
///
/// ```
/// use webgl_deploy::DeploySettings;
/// use webgl_deploy::proxy::render;
///
/// let settings = DeploySettings {
///     domain: "example.com".into(),
///     deploy_root_path: "srv".into(),
///     deploy_username: "web".into(),
///     deploy_folder: "apps".into(),
///     app_name: "demo".into(),
///     ..DeploySettings::default()
/// };
///
/// let conf = render(
///     "server_name *SERVER_NAME; location *LOCATION { *ALIAS_ROOT *BUILD_PATH; }",
///     &settings,
/// )
/// .unwrap();
///
/// assert_eq!(
///     conf,
///     "server_name example.com www.example.com; location / { root /srv/web/apps/demo; }"
/// );
/// ```
pub fn render(template: &str, settings: &DeploySettings) -> DeployResult<String> {
    let domain = settings.domain.trim().trim_end_matches('/');
    let location = settings.location_prefix();
    let build_path = settings.remote_deploy_path();

    check_value(SERVER_NAME, domain)?;
    check_value(LOCATION, &location)?;
    check_value(BUILD_PATH, &build_path)?;

    Ok(template
        .replace(SERVER_NAME, &settings.server_names())
        .replace(LOCATION, &location)
        .replace(BUILD_PATH, &build_path)
        .replace(ALIAS_ROOT, settings.proxy_directive().as_str()))
}

/// `(sites-available path, sites-enabled path)` for the app.
#[must_use]
pub fn site_paths(settings: &DeploySettings) -> (String, String) {
    let name = settings.app_name.trim();
    (
        remote::child(SITES_AVAILABLE, name),
        remote::child(SITES_ENABLED, name),
    )
}

/// Link the site into `sites-enabled`, check the config, and reload
/// nginx. Every path is shell-quoted.
#[must_use]
pub fn activate_command(settings: &DeploySettings) -> String {
    let (available, enabled) = site_paths(settings);
    format!(
        "ln -sfn {} {} && nginx -t && sleep 1 && {RELOAD_COMMAND}",
        remote::shell_quote(&available),
        remote::shell_quote(&enabled),
    )
}

/// Render the site config, upload it as the proxy user, and reload
/// nginx. Returns the combined output of the reload command.
pub fn update_proxy_config(
    connector: &dyn Connector,
    settings: &DeploySettings,
) -> DeployResult<String> {
    settings.validate_for_proxy()?;

    let template = load_template(settings)?;
    let rendered = render(&template, settings)?;
    let (available, _) = site_paths(settings);

    eprintln!(
        "Updating nginx site {} on {}@{}",
        settings.app_name, settings.proxy_username, settings.ip_server
    );

    let session = connector.connect(&settings.proxy_username)?;

    let mut content = rendered.as_bytes();
    session.fs().upload(&mut content, &available)?;
    eprintln!("  Wrote {available}");

    let result = session.shell().exec(&activate_command(settings))?;
    if !result.success() {
        return Err(DeployError::RemoteCommand {
            status: result.status,
            output: result.output,
        });
    }

    eprintln!("  nginx reloaded");
    Ok(result.output)
}
