//! Path helpers for SSH options.

use camino::Utf8PathBuf;
use uuid::Uuid;

use super::SessionError;

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If `HOME` is not set the input is returned unchanged.
///
/// # Examples
///
/// ```
/// # use pgprovision::session::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/.ssh/id_ed25519"), format!("{home}/.ssh/id_ed25519"));
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Picks a fresh control socket path inside `control_dir`, or the system
/// temporary directory when none is configured.
///
/// Socket names stay short because Unix socket paths are limited to roughly
/// a hundred bytes.
pub(crate) fn control_socket_path(control_dir: Option<&str>) -> Result<Utf8PathBuf, SessionError> {
    let dir = match control_dir {
        Some(dir) => Utf8PathBuf::from(expand_tilde(dir)),
        None => Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|_| {
            SessionError::InvalidConfig {
                field: String::from("control_dir"),
            }
        })?,
    };
    let name = Uuid::new_v4().simple().to_string();
    Ok(dir.join(format!("pgp-{name}.sock")))
}
