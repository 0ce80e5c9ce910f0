// ABOUTME: Pure naming rules for canary and versioned service names.
// ABOUTME: No I/O; every function is a total string transformation.

/// Delimiter between a service prefix and its blue/green version number.
pub const VERSION_DELIMITER: &str = "__";

/// Tag key recording which side of a blue/green pair a service is on.
pub const VERSION_TAG_KEY: &str = "deployment-version";
pub const VERSION_BLUE: &str = "blue";
pub const VERSION_GREEN: &str = "green";

/// Canary services are named by plain concatenation, no separator:
/// `"ecs" + "canary" == "ecscanary"`.
pub fn canary_service_name(base: &str, suffix: &str) -> String {
    format!("{base}{suffix}")
}

/// `prefix__n` for the given version slot.
pub fn versioned(base: &str, version: u8) -> String {
    format!("{base}{VERSION_DELIMITER}{version}")
}

/// The version slot a name carries, if it has one.
pub fn version_of(name: &str) -> Option<u8> {
    let (_, suffix) = name.rsplit_once(VERSION_DELIMITER)?;
    suffix.parse().ok()
}

/// Strip a trailing `__n` suffix; names without one come back unchanged.
pub fn base_prefix(name: &str) -> &str {
    match name.rsplit_once(VERSION_DELIMITER) {
        Some((prefix, suffix)) if suffix.parse::<u8>().is_ok() => prefix,
        _ => name,
    }
}

/// The slot for the next (stage) service. Only versions 1 and 2 alternate:
/// if blue is `base__1` the stage is `base__2`, and vice versa. With no blue
/// service yet, stage is `base__1`.
pub fn stage_service_name(base: &str, blue: Option<&str>) -> String {
    match blue.and_then(version_of) {
        Some(1) => versioned(base, 2),
        _ => versioned(base, 1),
    }
}
