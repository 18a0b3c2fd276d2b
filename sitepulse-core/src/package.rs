use crate::report::ReportError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Every file below `dir`, sorted, paired with its `/`-separated name
/// relative to `dir`.
fn collect_files(dir: &Path) -> io::Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(dir) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((path.clone(), name));
            }
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Zip the contents of `dir` into `zip_path`. The archive itself is skipped
/// when it lives inside `dir`.
pub fn package_directory(dir: &Path, zip_path: &Path) -> Result<PathBuf, ReportError> {
    if let Some(parent) = zip_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let files = collect_files(dir)?;
    let zip_canonical = zip_path.canonicalize().ok();

    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut added = 0;
    for (path, name) in files {
        if zip_canonical.is_some() && path.canonicalize().ok() == zip_canonical {
            continue;
        }
        debug!("Adding {} to archive", name);
        writer.start_file(name, options)?;
        io::copy(&mut File::open(&path)?, &mut writer)?;
        added += 1;
    }
    writer.finish()?;

    info!("Packaged {} files into {}", added, zip_path.display());
    Ok(zip_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_package_directory_keeps_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.xlsx"), b"sheet").unwrap();
        fs::create_dir(dir.path().join("extra")).unwrap();
        fs::write(dir.path().join("extra").join("notes.txt"), b"notes").unwrap();

        let out = tempfile::tempdir().unwrap();
        let zip_path = out.path().join("bundle.zip");
        package_directory(dir.path(), &zip_path).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        archive
            .by_name("extra/notes.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "notes");
        assert!(archive.by_name("report.xlsx").is_ok());
    }

    #[test]
    fn test_archive_inside_directory_is_not_packed_into_itself() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.xlsx"), b"sheet").unwrap();
        let zip_path = dir.path().join("bundle.zip");
        fs::write(&zip_path, b"stale").unwrap();

        package_directory(dir.path(), &zip_path).unwrap();

        let archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }
}
