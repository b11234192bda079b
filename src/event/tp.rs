use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::EventConfig;
use crate::error::{Error, Result};
use crate::ffi::bindings as b;

/// Tracepoint addressed by name, resolved through [`Tracefs`] when configured.
///
/// # Examples
///
/// ```rust,no_run
/// use perf_event_ring::config::Attr;
/// use perf_event_ring::event::{tp::Tracepoint, Configure};
///
/// let mut attr = Attr::default();
/// Tracepoint::new("syscalls", "sys_enter_getpid").configure(&mut attr).unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tracepoint {
    pub subsystem: String,
    pub name: String,
}

impl Tracepoint {
    pub fn new(subsystem: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            name: name.into(),
        }
    }
}

super::configure!(Tracepoint, value, {
    let TracepointId(id) = Tracefs::default().tracepoint(&value.subsystem, &value.name)?;
    Ok(EventConfig {
        ty: b::PERF_TYPE_TRACEPOINT,
        config: id,
        ..Default::default()
    })
});

/// Tracepoint addressed by its numeric id, as found in tracefs `events/*/*/id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TracepointId(pub u64);

super::configure!(TracepointId, value, {
    Ok(EventConfig {
        ty: b::PERF_TYPE_TRACEPOINT,
        config: value.0,
        ..Default::default()
    })
});

/// Resolves tracepoint names to ids by reading the tracing filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tracefs {
    roots: Vec<PathBuf>,
}

impl Default for Tracefs {
    /// Searches the tracefs mount point, then the legacy debugfs location.
    fn default() -> Self {
        Self {
            roots: vec![
                PathBuf::from("/sys/kernel/tracing"),
                PathBuf::from("/sys/kernel/debug/tracing"),
            ],
        }
    }
}

impl Tracefs {
    /// Searches `roots` in order.
    pub fn new<P: Into<PathBuf>>(roots: impl IntoIterator<Item = P>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Searches only `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self::new([root])
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn tracepoint(&self, subsystem: &str, name: &str) -> Result<TracepointId> {
        let valid = |s: &str| !s.is_empty() && s != ".." && !s.contains('/');
        if !valid(subsystem) || !valid(name) {
            return Err(Error::NotFound(format!("tracepoint {subsystem}:{name}")));
        }

        let mut denied = None;
        for root in &self.roots {
            let path = root.join("events").join(subsystem).join(name).join("id");
            match fs::read_to_string(&path) {
                Ok(text) => {
                    let id = text.trim().parse().map_err(|_| {
                        Error::NotFound(format!("malformed tracepoint id in {}", path.display()))
                    })?;
                    log::trace!("tracepoint {subsystem}:{name} is {id}");
                    return Ok(TracepointId(id));
                }
                Err(e) if e.kind() == ErrorKind::PermissionDenied => denied = Some(e),
                Err(_) => continue,
            }
        }

        match denied {
            Some(e) => Err(Error::PermissionDenied(e)),
            None => Err(Error::NotFound(format!("tracepoint {subsystem}:{name}"))),
        }
    }
}
