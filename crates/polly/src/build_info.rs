use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = match option_env!("POLLY_BUILD_COMMIT") {
    Some(c) => c,
    None => "unknown",
};

/// Version line printed by `polly --version`.
pub fn version_string() -> String {
    format!("{VERSION} (commit: {COMMIT})")
}

/// Body of `GET /version`.
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: VERSION,
            commit: COMMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_package_version() {
        assert!(version_string().starts_with(VERSION));
    }

    #[test]
    fn build_info_serializes_name_and_version() {
        let json = serde_json::to_value(BuildInfo::default()).unwrap();
        assert_eq!(json["name"], "polly");
        assert_eq!(json["version"], VERSION);
    }
}
