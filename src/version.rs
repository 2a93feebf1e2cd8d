use url::form_urlencoded;

/// Name of the diagnostic header attached to every request.
pub const CLIENT_LIB_HEADER: &str = "X-Asana-Client-Lib";

/// Library and runtime facts reported to the API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionInfo {
    pub version: String,
    pub language: String,
    pub language_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
}

impl VersionInfo {
    /// Form-urlencoded header value; absent fields are omitted.
    pub fn header_value(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("version", &self.version);
        serializer.append_pair("language", &self.language);
        let optional = [
            ("language_version", &self.language_version),
            ("os", &self.os),
            ("os_version", &self.os_version),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

/// Source of [`VersionInfo`] for the current platform.
pub trait DiagnosticsProvider: Send + Sync {
    fn collect(&self) -> VersionInfo;
}

/// Reports the rustc version captured at build time and the host OS.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeDiagnostics;

#[cfg(not(target_arch = "wasm32"))]
impl DiagnosticsProvider for NativeDiagnostics {
    fn collect(&self) -> VersionInfo {
        VersionInfo {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            language: "Rust".to_owned(),
            language_version: Some(env!("ASANA_DISPATCH_RUSTC_VERSION").to_owned()),
            os: Some(std::env::consts::OS.to_owned()),
            os_version: Some(os_release()),
        }
    }
}

#[cfg(target_os = "linux")]
fn os_release() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|release| release.trim().to_owned())
        .unwrap_or_else(|_| "unknown".to_owned())
}

#[cfg(all(not(target_os = "linux"), not(target_arch = "wasm32")))]
fn os_release() -> String {
    "unknown".to_owned()
}

/// Browser runtimes expose neither the OS nor a language version.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct WasmDiagnostics;

#[cfg(target_arch = "wasm32")]
impl DiagnosticsProvider for WasmDiagnostics {
    fn collect(&self) -> VersionInfo {
        VersionInfo {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            language: "Rust-wasm".to_owned(),
            language_version: None,
            os: None,
            os_version: None,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn platform_diagnostics() -> NativeDiagnostics {
    NativeDiagnostics
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn platform_diagnostics() -> WasmDiagnostics {
    WasmDiagnostics
}

#[cfg(test)]
mod tests {
    use super::VersionInfo;

    #[test]
    fn header_value_is_form_encoded() {
        let info = VersionInfo {
            version: "0.1.0".to_owned(),
            language: "Rust".to_owned(),
            language_version: Some("1.80.0".to_owned()),
            os: Some("linux".to_owned()),
            os_version: Some("6.1.0-18 amd64".to_owned()),
        };
        assert_eq!(
            info.header_value(),
            "version=0.1.0&language=Rust&language_version=1.80.0&os=linux&os_version=6.1.0-18+amd64"
        );
    }

    #[test]
    fn header_value_omits_missing_fields() {
        let info = VersionInfo {
            version: "0.1.0".to_owned(),
            language: "Rust-wasm".to_owned(),
            language_version: None,
            os: None,
            os_version: None,
        };
        assert_eq!(info.header_value(), "version=0.1.0&language=Rust-wasm");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn native_diagnostics_report_crate_version() {
        use super::{DiagnosticsProvider, NativeDiagnostics};

        let info = NativeDiagnostics.collect();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.language, "Rust");
        assert!(info.os.is_some());
    }
}
