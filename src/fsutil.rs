use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Error that occurs when listing a directory fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to list directory `{path}`: {source}")]
pub struct DirReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use taskstats_monitor::fsutil;
/// let reader = fsutil::open_file_reader("/sys/fs/cgroup/cpuset/tasks")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Returns the names of all entries of the directory at `path`, in no particular order.
///
/// # Errors
///
/// Returns a [`DirReadError`] if the directory or one of its entries cannot be read.
pub fn read_dir_names(path: impl AsRef<Path>) -> Result<Vec<OsString>, DirReadError> {
    let path = path.as_ref();
    let to_error = |source: io::Error| DirReadError {
        path: path.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(path).map_err(to_error)? {
        names.push(entry.map_err(to_error)?.file_name());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_open_file_reader_success() {
        let tmp = tempfile::NamedTempFile::new().expect("failed to create temp file");
        let path = tmp.path();
        let reader = open_file_reader(path).expect("should open test file");
        let metadata = reader.get_ref().metadata().unwrap();
        assert!(metadata.is_file());
    }

    #[test]
    fn test_open_file_reader_error() {
        let result = open_file_reader("/definitely/does/not/exist");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.path, PathBuf::from("/definitely/does/not/exist"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_dir_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("job_1")).unwrap();
        std::fs::write(dir.path().join("tasks"), "").unwrap();

        let mut names = read_dir_names(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec![OsString::from("job_1"), OsString::from("tasks")]);
    }

    #[test]
    fn test_read_dir_names_error() {
        let err = read_dir_names("/definitely/does/not/exist").unwrap_err();
        assert_eq!(err.path, PathBuf::from("/definitely/does/not/exist"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }
}
