use std::path::PathBuf;

use wedash_types::Service;

use crate::{raw::RawServiceFile, ConfigError};

/// Overrides read from a service's sidecar file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceFile {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub project: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl ServiceFile {
    /// Apply the overrides on top of a discovered service.
    ///
    /// A relative `log_file` is resolved against the service directory.
    pub fn apply(self, service: &mut Service) {
        if let Some(name) = self.name {
            service.name = name;
        }
        if let Some(unit) = self.unit {
            service.unit = unit;
        }
        if let Some(project) = self.project {
            service.project = Some(project);
        }
        if let Some(log_file) = self.log_file {
            service.log_file = Some(if log_file.is_absolute() {
                log_file
            } else {
                service.dir.join(log_file)
            });
        }
    }
}

fn non_blank(field: &str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Validation(format!(
            "`{field}` is empty"
        ))),
        Some(v) => Ok(Some(v.trim().to_owned())),
        None => Ok(None),
    }
}

impl TryFrom<RawServiceFile> for ServiceFile {
    type Error = ConfigError;

    fn try_from(raw: RawServiceFile) -> Result<Self, Self::Error> {
        Ok(ServiceFile {
            name: non_blank("name", raw.name)?,
            unit: non_blank("unit", raw.unit)?,
            project: non_blank("project", raw.project)?,
            log_file: non_blank("log_file", raw.log_file)?.map(PathBuf::from),
        })
    }
}
