//! Package references.
//!
//! A reference names a package as `host/namespace/name:tag`. Any of the
//! leading components may be omitted when parsing (`name`, `namespace/name`,
//! `name:tag`, ...), but only a complete reference can be pushed. The host
//! may carry a port (`registry.example:5000`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace under which manifests are stored.
pub const MANIFEST_PREFIX: &str = "manifests";

/// A parsed package reference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub host: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub tag: Option<String>,
}

impl PackageRef {
    /// Parse a reference string.
    ///
    /// Missing components are allowed here; use [`PackageRef::is_complete`]
    /// or [`PackageRef::require_complete`] before acting on the result.
    /// Components that are present but malformed are an error.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidReference("empty reference".to_string()));
        }

        // The tag separator is the last ':' after the last '/'.
        let last_slash = s.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (path, tag) = match s[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&s[..split], Some(&s[split + 1..]))
            }
            None => (s, None),
        };

        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.len() > 3 {
            return Err(crate::Error::InvalidReference(format!(
                "too many path components in {s:?}"
            )));
        }

        let mut reference = PackageRef {
            tag: tag.map(|t| validate_component("tag", t)).transpose()?,
            ..Default::default()
        };
        let slots = [
            &mut reference.name,
            &mut reference.namespace,
            &mut reference.host,
        ];
        for (slot, kind) in slots.into_iter().zip(["name", "namespace", "host"]) {
            match segments.pop() {
                Some(segment) if kind == "host" => *slot = Some(validate_host(segment)?),
                Some(segment) => *slot = Some(validate_component(kind, segment)?),
                None => break,
            }
        }

        Ok(reference)
    }

    /// Whether every component is present.
    pub fn is_complete(&self) -> bool {
        self.host.is_some() && self.namespace.is_some() && self.name.is_some() && self.tag.is_some()
    }

    /// Return an error describing the first missing component, if any.
    pub fn require_complete(&self) -> crate::Result<()> {
        let missing = [
            ("host", &self.host),
            ("namespace", &self.namespace),
            ("name", &self.name),
            ("tag", &self.tag),
        ]
        .into_iter()
        .find(|(_, value)| value.is_none());

        match missing {
            Some((kind, _)) => Err(crate::Error::InvalidReference(format!(
                "must be complete: missing {kind}"
            ))),
            None => Ok(()),
        }
    }

    /// The components in storage order: host, namespace, name, tag.
    /// Absent components are skipped.
    pub fn path_components(&self) -> Vec<&str> {
        [&self.host, &self.namespace, &self.name, &self.tag]
            .into_iter()
            .filter_map(|c| c.as_deref())
            .collect()
    }

    /// Get the object store key for this reference's manifest.
    pub fn to_manifest_key(&self) -> String {
        let mut key = String::from(MANIFEST_PREFIX);
        for component in self.path_components() {
            key.push('/');
            key.push_str(component);
        }
        key
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<&str> = [&self.host, &self.namespace, &self.name]
            .into_iter()
            .filter_map(|c| c.as_deref())
            .collect();
        f.write_str(&path.join("/"))?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        Ok(())
    }
}

fn validate_component(kind: &str, value: &str) -> crate::Result<String> {
    if value.is_empty() {
        return Err(crate::Error::InvalidReference(format!("empty {kind}")));
    }
    if value.starts_with(['.', '-']) {
        return Err(crate::Error::InvalidReference(format!(
            "{kind} must not start with '.' or '-': {value:?}"
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(crate::Error::InvalidReference(format!(
            "invalid character {c:?} in {kind} {value:?}"
        )));
    }
    Ok(value.to_string())
}

/// A host component, optionally followed by `:<port>`.
fn validate_host(value: &str) -> crate::Result<String> {
    let Some((name, port)) = value.split_once(':') else {
        return validate_component("host", value);
    };
    validate_component("host", name)?;
    if !port.bytes().all(|b| b.is_ascii_digit()) || port.parse::<u16>().is_err() {
        return Err(crate::Error::InvalidReference(format!(
            "invalid port {port:?} in host {value:?}"
        )));
    }
    Ok(value.to_string())
}
