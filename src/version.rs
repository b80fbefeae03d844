//! Version information.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit SHA, when the build environment provides `SADDLERY_GIT_SHA`.
pub const GIT_SHA: Option<&str> = option_env!("SADDLERY_GIT_SHA");

/// Full version string: `{version}` or `{version}+{sha}` (short sha).
pub fn version_string() -> String {
    match GIT_SHA {
        Some(sha) => format!("{PKG_VERSION}+{}", &sha[..7.min(sha.len())]),
        None => PKG_VERSION.to_string(),
    }
}
