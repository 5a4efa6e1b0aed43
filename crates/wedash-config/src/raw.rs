use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawServiceFile {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub project: Option<String>,
    pub log_file: Option<String>,
}
