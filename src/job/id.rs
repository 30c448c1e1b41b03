use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use super::{Error, Result};

/// The maximum allowed length for a [`JobID`].
const JOB_ID_MAX_LEN: usize = 255;

/// A validated job identifier.
///
/// # Examples
///
/// ```
/// # use taskstats_monitor::job::JobID;
/// let job_id = JobID::new("4242").unwrap();
/// assert_eq!(job_id.as_ref(), "4242");
/// assert!(JobID::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobID(Arc<str>);

impl JobID {
    /// Creates a new `JobID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJobID`] if the input is empty or longer than
    /// [`JOB_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > JOB_ID_MAX_LEN {
            return Err(Error::InvalidJobID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

impl AsRef<str> for JobID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for JobID {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
