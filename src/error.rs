/// Absorbs an error by logging it, for failures that must not end a sampling cycle.
pub trait ResultOkLogExt<T, E> {
    /// Returns the success value, or logs `context` with the error and returns `None`.
    fn ok_log(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log() {
        let ok: Result<u32, std::io::Error> = Ok(3);
        assert_eq!(ok.ok_log("unused"), Some(3));

        let err: Result<u32, std::io::Error> = Err(std::io::ErrorKind::NotFound.into());
        assert_eq!(err.ok_log("lookup failed"), None);
    }
}
