use std::{io, path::Path};

/// Total number of bytes occupied by everything under `dir_path`.
pub fn dir_disk_size<P: AsRef<Path>>(dir_path: P) -> u64 {
  fs_extra::dir::get_size(dir_path).unwrap_or(0)
}

/// Bytes still free on the filesystem backing the current working
/// directory. Used to bail a merge out early rather than run a host out of
/// disk mid-compaction.
pub fn available_disk_space() -> u64 {
  fs2::available_space(".").unwrap_or(0)
}

/// Recursively copies `src` into `dst`, skipping any entry whose file name
/// appears in `exclude` (the directory lock file, in practice — a backup
/// should not carry someone else's live lock).
pub fn copy_dir<P: AsRef<Path>>(src: P, dst: P, exclude: &[&str]) -> io::Result<()> {
  std::fs::create_dir_all(&dst)?;

  for entry in std::fs::read_dir(&src)? {
    let entry = entry?;
    let file_name = entry.file_name();
    if exclude
      .iter()
      .any(|ex| file_name.to_str() == Some(*ex))
    {
      continue;
    }

    let src_path = entry.path();
    let dst_path = dst.as_ref().join(&file_name);
    if src_path.is_dir() {
      copy_dir(&src_path, &dst_path, exclude)?;
    } else {
      std::fs::copy(&src_path, &dst_path)?;
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn test_copy_dir_excludes_lock_file() {
    let src = tempdir().unwrap();
    std::fs::write(src.path().join("a.data"), b"hello").unwrap();
    std::fs::write(src.path().join("flock"), b"lock").unwrap();

    let dst = tempdir().unwrap();
    copy_dir(src.path(), dst.path(), &["flock"]).unwrap();

    assert!(dst.path().join("a.data").is_file());
    assert!(!dst.path().join("flock").exists());
  }

  #[test]
  fn test_dir_disk_size_nonzero() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.data"), vec![0u8; 128]).unwrap();
    assert!(dir_disk_size(dir.path()) >= 128);
  }
}
