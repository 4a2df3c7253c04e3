//! Where fmcsync keeps its files
//!
//! Both directories resolve the same way, first match wins:
//!
//! | | config (`config.toml`) | state (`state.json`) |
//! |---|---|---|
//! | override | `FMCSYNC_CONFIG_DIR` | `FMCSYNC_STATE_DIR` |
//! | XDG | `$XDG_CONFIG_HOME/fmcsync` | `$XDG_STATE_HOME/fmcsync` |
//! | Windows | `%APPDATA%\fmcsync` | `%LOCALAPPDATA%\fmcsync` |
//! | default | `~/.config/fmcsync` | `~/.local/state/fmcsync` |
//!
//! Override values may use `~` and `$VARS`.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "FMCSYNC_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "FMCSYNC_STATE_DIR";

const APP_DIR: &str = "fmcsync";

struct DirLayout {
    label: &'static str,
    override_var: &'static str,
    xdg_var: &'static str,
    platform: fn() -> Option<PathBuf>,
    /// Below the home directory
    fallback: &'static [&'static str],
}

const CONFIG: DirLayout = DirLayout {
    label: "config",
    override_var: ENV_CONFIG_DIR,
    xdg_var: "XDG_CONFIG_HOME",
    platform: dirs::config_dir,
    fallback: &[".config"],
};

const STATE: DirLayout = DirLayout {
    label: "state",
    override_var: ENV_STATE_DIR,
    xdg_var: "XDG_STATE_HOME",
    platform: dirs::data_local_dir,
    fallback: &[".local", "state"],
};

/// Get the fmcsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve(&CONFIG)
}

/// Get the fmcsync state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve(&STATE)
}

fn resolve(layout: &DirLayout) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(layout.override_var) {
        let path = expand(&dir);
        log::debug!(
            "{} dir from {}: {}",
            layout.label,
            layout.override_var,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg) = std::env::var(layout.xdg_var) {
        let path = Path::new(&xdg).join(APP_DIR);
        log::debug!("{} dir from {}: {}", layout.label, layout.xdg_var, path.display());
        return Ok(path);
    }

    if cfg!(windows)
        && let Some(base) = (layout.platform)()
    {
        return Ok(base.join(APP_DIR));
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = layout
        .fallback
        .iter()
        .fold(home, |path, part| path.join(part))
        .join(APP_DIR);
    log::debug!("default {} dir: {}", layout.label, path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path string
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `key` set to `value` (or removed), restoring it afterwards
    ///
    /// Each variable is touched by a single test so parallel tests don't race.
    fn with_env<R>(key: &str, value: Option<&str>, f: impl FnOnce() -> R) -> R {
        let original = env::var(key).ok();
        // SAFETY: no other test reads or writes this variable
        unsafe {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let result = f();
        // SAFETY: as above
        unsafe {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_config_dir_override() {
        with_env(ENV_CONFIG_DIR, Some("/srv/fmcsync/config"), || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/srv/fmcsync/config"));
        });

        let home = dirs::home_dir().unwrap();
        with_env(ENV_CONFIG_DIR, Some("~/lab/fmcsync"), || {
            assert_eq!(config_dir().unwrap(), home.join("lab").join("fmcsync"));
        });
    }

    #[test]
    fn test_state_dir_resolution() {
        with_env(ENV_STATE_DIR, Some("/srv/fmcsync/state"), || {
            assert_eq!(state_dir().unwrap(), PathBuf::from("/srv/fmcsync/state"));
        });

        with_env(ENV_STATE_DIR, None, || {
            with_env("XDG_STATE_HOME", Some("/tmp/xdg-state"), || {
                assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/xdg-state/fmcsync"));
            });
        });
    }

    #[test]
    fn test_expand() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/objects/hosts.toml"), home.join("objects/hosts.toml"));

        with_env("FMCSYNC_TEST_SITE", Some("dc1"), || {
            assert_eq!(
                expand("/sites/$FMCSYNC_TEST_SITE/groups.toml"),
                PathBuf::from("/sites/dc1/groups.toml")
            );
        });

        assert_eq!(
            expand("/path/$FMCSYNC_UNSET_12345/x"),
            PathBuf::from("/path/$FMCSYNC_UNSET_12345/x")
        );
    }
}
