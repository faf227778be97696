//! User-Agent string sent with every listing and archive request.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/zipgrab";

/// Default User-Agent (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("zipgrab/{version} (archive-mirroring-tool; +{PROJECT_UA_URL})")
}
