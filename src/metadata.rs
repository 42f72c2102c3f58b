//! Build metadata.

/// Release version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source revision, injected at build time through `PDNS_BUILD_HASH`.
pub const HASH: &str = match option_env!("PDNS_BUILD_HASH") {
    Some(hash) => hash,
    None => "000000",
};

/// Build date as RFC 3339, injected through `PDNS_BUILD_DATE`.
pub const BUILD_DATE: &str = match option_env!("PDNS_BUILD_DATE") {
    Some(date) => date,
    None => "1970-01-01 00:00:00+00:00",
};

/// Version string, optionally with revision and build date.
pub fn version(detail: bool) -> String {
    if detail {
        format!("{VERSION} ({HASH}) {BUILD_DATE}")
    } else {
        VERSION.to_string()
    }
}
