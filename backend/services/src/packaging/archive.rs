//! Filesystem and zip helpers for packaging. All functions block.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ServiceError, ServiceResult};

/// Recursively copies `src` into `dst`, creating `dst`. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> ServiceResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let target = dst.join(relative_to(src, entry.path())?);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            log::warn!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(copied)
}

/// Zips the contents of `src` (not `src` itself) into `archive_path`,
/// replacing any existing archive. Entries are written in path order with
/// a fixed timestamp so the same tree always yields the same bytes.
pub fn zip_directory(src: &Path, archive_path: &Path) -> ServiceResult<usize> {
    let partial = archive_path.with_extension("zip.partial");
    let file = File::create(&partial)?;
    let mut zip = ZipWriter::new(file);

    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    let dir_options = file_options.unix_permissions(0o755);

    let mut entries = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let name = entry_name(relative_to(src, entry.path())?);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(name, dir_options)?;
        } else if file_type.is_file() {
            zip.start_file(name, file_options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut zip)?;
            entries += 1;
        } else {
            log::warn!("Not archiving non-regular file {}", entry.path().display());
        }
    }
    zip.finish()?;

    fs::rename(&partial, archive_path)?;
    Ok(entries)
}

/// Unpacks `archive_path` into `dest`. Entries that would land outside
/// `dest` are rejected.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> ServiceResult<usize> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    fs::create_dir_all(dest)?;

    let mut files = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            ServiceError::BadInput(format!("archive entry '{}' has an unsafe path", entry.name()))
        })?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        files += 1;
    }
    Ok(files)
}

/// Moves every top-level entry of `from` into `to`, skipping names in `skip`.
pub fn move_entries(from: &Path, to: &Path, skip: &[String]) -> ServiceResult<usize> {
    let mut moved = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if skip.iter().any(|s| name.to_str() == Some(s.as_str())) {
            continue;
        }
        move_path(&entry.path(), &to.join(&name))?;
        moved += 1;
    }
    Ok(moved)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_path(src: &Path, dst: &Path) -> ServiceResult<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!("rename {} failed ({}), copying instead", src.display(), e);
            if src.is_dir() {
                copy_tree(src, dst)?;
                fs::remove_dir_all(src)?;
            } else {
                fs::copy(src, dst)?;
                fs::remove_file(src)?;
            }
            Ok(())
        }
    }
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> ServiceResult<&'a Path> {
    path.strip_prefix(root).map_err(|_| {
        ServiceError::Io(io::Error::other(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        )))
    })
}

/// Zip entry names always use forward slashes.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Top-level names in `dir`, sorted.
pub fn list_top_level(dir: &Path) -> ServiceResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("weights/layer1")).unwrap();
        fs::write(root.join("model.pkl"), b"pickle").unwrap();
        fs::write(root.join("weights/layer1/w.bin"), b"\x00\x01\x02").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
    }

    #[test]
    fn copy_tree_preserves_structure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        sample_tree(&src);

        let copied = copy_tree(&src, &tmp.path().join("dst")).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read(tmp.path().join("dst/weights/layer1/w.bin")).unwrap(), b"\x00\x01\x02");
        assert!(tmp.path().join("dst/empty").is_dir());
    }

    #[test]
    fn zip_then_extract_restores_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        sample_tree(&src);
        let archive = tmp.path().join("out.zip");

        let written = zip_directory(&src, &archive).unwrap();
        assert_eq!(written, 2);
        assert!(!tmp.path().join("out.zip.partial").exists());

        let dest = tmp.path().join("unpacked");
        let files = extract_archive(&archive, &dest).unwrap();
        assert_eq!(files, 2);
        assert_eq!(fs::read(dest.join("model.pkl")).unwrap(), b"pickle");
        assert!(dest.join("empty").is_dir());
    }

    #[test]
    fn zipping_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        sample_tree(&src);

        zip_directory(&src, &tmp.path().join("a.zip")).unwrap();
        zip_directory(&src, &tmp.path().join("b.zip")).unwrap();

        assert_eq!(
            fs::read(tmp.path().join("a.zip")).unwrap(),
            fs::read(tmp.path().join("b.zip")).unwrap()
        );
    }

    #[test]
    fn extract_rejects_escaping_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("evil.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            zip.start_file("../outside.txt", SimpleFileOptions::default()).unwrap();
            io::Write::write_all(&mut zip, b"x").unwrap();
            zip.finish().unwrap();
        }

        let err = extract_archive(&archive, &tmp.path().join("dest")).unwrap_err();
        assert!(matches!(err, ServiceError::BadInput(_)));
        assert!(!tmp.path().join("outside.txt").exists());
    }

    #[test]
    fn move_entries_skips_requested_names() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("from");
        sample_tree(&from);
        fs::create_dir_all(from.join("metadata")).unwrap();
        let to = tmp.path().join("to");
        fs::create_dir_all(&to).unwrap();

        let moved = move_entries(&from, &to, &["metadata".to_string()]).unwrap();

        assert_eq!(moved, 3);
        assert!(to.join("weights/layer1/w.bin").is_file());
        assert!(!to.join("metadata").exists());
        assert!(from.join("metadata").exists());
    }
}
