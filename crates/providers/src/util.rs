use ga_domain::error::Error;

/// Map a reqwest error into the shared error type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Http(format!("timeout: {e}"))
    } else {
        Error::Http(e.to_string())
    }
}
