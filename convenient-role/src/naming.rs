//! Deterministic image names, tags and role directory names

/// Longest tag an image registry accepts
pub const MAX_TAG_LENGTH: usize = 128;

/// Name suffix of the shared base image every role image starts from
pub const ROLE_BASE_SUFFIX: &str = "role-base";

/// Naming error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NamingError {
    /// Role name cannot be used as an image or directory name
    #[error("Invalid role name {name:?}: {reason}")]
    InvalidRoleName {
        /// Offending name
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Job or package name cannot be used as a path component
    #[error("Invalid {kind} name {name:?}: {reason}")]
    InvalidComponentName {
        /// What the name belongs to ("job", "package")
        kind: &'static str,
        /// Offending name
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Image name of a role: `<repository>-<role>:<version>`
pub fn role_image_name(repository: &str, role_name: &str, version: &str) -> String {
    format!("{}-{}:{}", repository, role_name, sanitize_tag(version))
}

/// Image name of the shared role base: `<repository>-role-base:<version>`
pub fn base_image_name(repository: &str, base_image_version: &str) -> String {
    format!(
        "{}-{}:{}",
        repository,
        ROLE_BASE_SUFFIX,
        sanitize_tag(base_image_version)
    )
}

/// Turn an arbitrary version string into a valid image tag.
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`, as does a leading `.` or
/// `-`. The result is capped at [`MAX_TAG_LENGTH`]; an empty version maps to
/// `latest`.
pub fn sanitize_tag(version: &str) -> String {
    if version.is_empty() {
        return "latest".to_string();
    }

    version
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            '.' | '-' if i == 0 => '_',
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') => c,
            _ => '_',
        })
        .take(MAX_TAG_LENGTH)
        .collect()
}

/// Directory name of a role's build context below the output root.
///
/// The name is the role name itself, after checking that it is a single safe
/// path component that is also valid inside an image name.
pub fn role_dir_name(role_name: &str) -> Result<&str, NamingError> {
    let invalid = |reason| NamingError::InvalidRoleName {
        name: role_name.to_string(),
        reason,
    };

    if role_name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if role_name == "." || role_name == ".." {
        return Err(invalid("name is a relative path component"));
    }
    if role_name.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if role_name.starts_with(['.', '-']) {
        return Err(invalid("name must start with a letter or digit"));
    }
    if !role_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("name may only contain [a-z0-9._-]"));
    }

    Ok(role_name)
}

/// Check that a job or package name is a single safe path component.
///
/// Such names become directories in the build context and in the image
/// (`/var/vcap/jobs/<job>`, `/var/vcap/packages/<package>`). Allowed are
/// `[A-Za-z0-9._+-]`, not starting with `.`.
pub fn component_name<'a>(kind: &'static str, name: &'a str) -> Result<&'a str, NamingError> {
    let invalid = |reason| NamingError::InvalidComponentName {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if name.starts_with('.') {
        return Err(invalid("name must not start with '.'"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
    {
        return Err(invalid("name may only contain [A-Za-z0-9._+-]"));
    }

    Ok(name)
}
