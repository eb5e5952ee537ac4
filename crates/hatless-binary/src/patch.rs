//! In-place patching of existing valid files.
//!
//! For small field-level edits (flipping a flag byte, rewriting one table
//! entry) a full re-encode is overkill: the file is already valid, so we
//! seek to the field's recorded offset and overwrite exactly its width.
//!
//! Every patch asserts that the bytes currently on disk differ from the new
//! ones. Re-patching an already-patched file means the caller's bookkeeping
//! is wrong, and that is fatal, not a warning.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

/// Overwrite `new_bytes.len()` bytes at `offset` in an open file.
///
/// Fails with [`Error::RepatchGuardViolation`], performing no write, if
/// the target already holds `new_bytes`.
pub fn patch_field<S: Read + Write + Seek>(
    stream: &mut S,
    offset: u64,
    new_bytes: &[u8],
) -> Result<()> {
    stream.seek(SeekFrom::Start(offset))?;
    let mut current = vec![0u8; new_bytes.len()];
    stream.read_exact(&mut current)?;
    if current == new_bytes {
        return Err(Error::RepatchGuardViolation {
            offset,
            width: new_bytes.len(),
        });
    }
    stream.seek(SeekFrom::Start(offset))?;
    stream.write_all(new_bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Read;

    fn scratch_file(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.bin");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_patch_overwrites_exact_width() {
        let (_dir, path) = scratch_file(&[1, 2, 3, 4, 5, 6]);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();

        patch_field(&mut file, 2, &[9, 9]).unwrap();
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 9, 9, 5, 6]);
    }

    #[test]
    fn test_repatch_guard_leaves_file_untouched() {
        let (_dir, path) = scratch_file(&[1, 2, 9, 9, 5, 6]);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();

        let err = patch_field(&mut file, 2, &[9, 9]);
        assert!(matches!(
            err,
            Err(Error::RepatchGuardViolation {
                offset: 2,
                width: 2
            })
        ));
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 9, 9, 5, 6]);
    }

    #[test]
    fn test_patch_past_eof_fails() {
        let (_dir, path) = scratch_file(&[1, 2, 3]);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();

        let mut probe = Vec::new();
        file.read_to_end(&mut probe).unwrap();
        assert!(matches!(
            patch_field(&mut file, 2, &[7, 7]),
            Err(Error::Io(_))
        ));
    }
}
