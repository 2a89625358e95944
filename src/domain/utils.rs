//! Fixed exposure policy tables and small formatting helpers shared by the directory

use std::collections::BTreeMap;

use serde_json::Value;

use crate::host::AttributeValue;

pub const RESOURCE_MIME_TYPE: &str = "application/json";
pub const NAME_SEPARATOR: &str = ", ";

/// Entity categories never offered as resources, whatever the exposure flag says.
pub const EXCLUDED_DOMAINS: [&str; 1] = ["script"];

pub const INTERESTING_ATTRIBUTES: [&str; 13] = [
    "temperature",
    "current_temperature",
    "temperature_unit",
    "brightness",
    "humidity",
    "unit_of_measurement",
    "device_class",
    "current_position",
    "percentage",
    "volume_level",
    "media_title",
    "media_artist",
    "media_album_name",
];

pub fn is_excluded_domain(domain: &str) -> bool {
    EXCLUDED_DOMAINS.contains(&domain)
}

/// Primary name followed by aliases, skipping blanks and repeats.
pub fn join_names(primary: &str, aliases: &[String]) -> String {
    let mut names: Vec<&str> = Vec::with_capacity(aliases.len() + 1);
    for name in std::iter::once(primary).chain(aliases.iter().map(String::as_str)) {
        let name = name.trim();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(NAME_SEPARATOR)
}

/// Keep only allow-listed attributes. `None` when nothing survives.
pub fn project_attributes(
    attributes: &BTreeMap<String, AttributeValue>,
    allow_list: &[&str],
) -> Option<BTreeMap<String, Value>> {
    let projected: BTreeMap<String, Value> = attributes
        .iter()
        .filter(|(key, _)| allow_list.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.to_projected_json()))
        .collect();

    (!projected.is_empty()).then_some(projected)
}
