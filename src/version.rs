/// Informational library version and build metadata.
///
/// Purely diagnostic; nothing here affects scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
  /// `YYYY-MM-DD`, stamped at build time (honors `SOURCE_DATE_EPOCH`).
  pub build_date: &'static str,
  pub debug_build: bool,
}

/// Returns the version of the `thread_orchestra` library itself.
pub fn version_info() -> VersionInfo {
  VersionInfo {
    major: parse_component(env!("CARGO_PKG_VERSION_MAJOR")),
    minor: parse_component(env!("CARGO_PKG_VERSION_MINOR")),
    patch: parse_component(env!("CARGO_PKG_VERSION_PATCH")),
    build_date: env!("THREAD_ORCHESTRA_BUILD_DATE"),
    debug_build: cfg!(debug_assertions),
  }
}

fn parse_component(component: &str) -> u32 {
  component.parse().unwrap_or(0)
}
