//! Small helpers shared by the backend adapters.

mod scoped_timer;

pub(crate) use scoped_timer::ScopedTimer;

#[cfg(test)]
mod utils_test;

/// Normalize a backend endpoint into a URL with exactly one scheme.
///
/// Accepts bare `host:port` pairs as well as already-schemed addresses;
/// `tls` picks the scheme added to bare addresses.
pub fn endpoint_url(
    addr: &str,
    tls: bool,
) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        return addr.to_string();
    }
    if tls {
        format!("https://{addr}")
    } else {
        format!("http://{addr}")
    }
}
