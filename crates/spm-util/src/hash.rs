use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Compute the MD5 digest of a file, returning it lowercase hex-encoded.
///
/// Registry metadata declares archive hashes as MD5, so cached archives are
/// compared against this value. The file is streamed, never read whole.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn md5_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the MD5 digest of a byte slice, lowercase hex-encoded.
#[must_use]
pub fn md5_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Check whether the file at `path` exists and hashes to `expected`.
///
/// Comparison ignores ASCII case. A missing or unreadable file is a mismatch.
#[must_use]
pub fn file_matches_md5(path: &Path, expected: &str) -> bool {
    match md5_file(path) {
        Ok(actual) => actual.eq_ignore_ascii_case(expected.trim()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Known MD5 of "hello world"
    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    #[test]
    fn test_md5_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        assert_eq!(md5_file(file.path()).unwrap(), HELLO_MD5);
    }

    #[test]
    fn test_md5_bytes() {
        assert_eq!(md5_bytes(b"hello world"), HELLO_MD5);
    }

    #[test]
    fn test_md5_file_not_found() {
        assert!(md5_file(Path::new("/nonexistent/file")).is_err());
    }

    #[test]
    fn test_file_matches_md5_case_insensitive() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        assert!(file_matches_md5(file.path(), HELLO_MD5));
        assert!(file_matches_md5(file.path(), &HELLO_MD5.to_uppercase()));
        assert!(!file_matches_md5(file.path(), "00000000000000000000000000000000"));
    }

    #[test]
    fn test_file_matches_md5_missing_file() {
        assert!(!file_matches_md5(Path::new("/nonexistent/file"), HELLO_MD5));
    }
}
