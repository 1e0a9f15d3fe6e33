//! Resolution of the SOAP endpoint from a user supplied instance address.

/// Path of the MantisConnect endpoint relative to the instance root.
pub const SOAP_PATH: &str = "/api/soap/mantisconnect.php";

/// Marker used to detect URLs that already point at the endpoint.
const SOAP_SCRIPT: &str = "mantisconnect.php";

/// The two URLs derived from a base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// The canonical SOAP endpoint, e.g. `https://host/api/soap/mantisconnect.php`.
    pub soap_url: String,
    /// The instance root, e.g. `https://host`.
    pub instance_url: String,
}

impl Endpoint {
    /// URL of the service contract (WSDL) document.
    pub fn wsdl_url(&self) -> String {
        format!("{}?wsdl", self.soap_url)
    }
}

/// Normalize a base address into the SOAP endpoint and instance root.
///
/// Accepts a bare host (`mantis.example.com`), an instance root, or the
/// endpoint itself. Trailing spaces and slashes are dropped, the endpoint path
/// is appended when missing and `http://` is prefixed when no scheme is
/// present. An existing `https://` scheme is kept.
pub fn resolve_endpoint(raw: &str) -> Endpoint {
    let mut soap_url = raw
        .trim_end_matches(|c| c == ' ' || c == '/')
        .to_string();

    if !contains_ignore_case(&soap_url, SOAP_SCRIPT) {
        soap_url.push_str(SOAP_PATH);
    }

    if !contains_ignore_case(&soap_url, "http") {
        soap_url.insert_str(0, "http://");
    }

    let instance_url = match find_ignore_case(&soap_url, "/api") {
        Some(index) => soap_url[..index].to_string(),
        None => soap_url.clone(),
    };

    Endpoint {
        soap_url,
        instance_url,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}

// ASCII lowercasing keeps byte offsets stable, so the index is valid in `haystack`.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}
