use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use tar::Archive;
use zip::read::ZipArchive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Guess the format from a file name; anything unrecognised is treated as zip.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else {
            ArchiveKind::Zip
        }
    }
}

/// Replaces an install directory with the contents of a release archive.
///
/// The old directory is deleted before extraction starts, so an interrupted
/// run leaves the directory missing or partial. The next check then reports
/// the channel as not installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Installer;

impl Installer {
    pub fn new() -> Self {
        Self
    }

    pub fn replace(
        &self,
        archive_path: &Path,
        kind: ArchiveKind,
        install_dir: &Path,
    ) -> Result<(), String> {
        if install_dir.exists() {
            info!("install: removing {}", install_dir.display());
            remove_dir(install_dir)?;
        }
        fs::create_dir_all(install_dir)
            .map_err(|e| format!("failed to create install dir: {e}"))?;

        info!(
            "install: extracting {} as {:?} into {}",
            archive_path.display(),
            kind,
            install_dir.display()
        );
        match kind {
            ArchiveKind::Zip => extract_zip(archive_path, install_dir),
            ArchiveKind::TarGz => extract_targz(archive_path, install_dir),
        }
    }
}

fn remove_dir(dir: &Path) -> Result<(), String> {
    fs::remove_dir_all(dir)
        .or_else(|first| {
            debug!("install: remove_dir_all failed ({first}); clearing files individually");
            for entry in walkdir::WalkDir::new(dir).into_iter().flatten() {
                if entry.file_type().is_file() {
                    clear_readonly(entry.path());
                    let _ = fs::remove_file(entry.path());
                }
            }
            fs::remove_dir_all(dir)
        })
        .map_err(|e| format!("failed to remove install dir: {e}"))
}

fn clear_readonly(path: &Path) {
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(path, perms);
        }
    }
}

fn extract_zip(archive_path: &Path, target: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("zip open error: {e}"))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("zip parse error: {e}"))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("install: skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = target.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| format!("zip dir create error: {e}"))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("zip parent dir error: {e}"))?;
        }
        let mut out_file =
            fs::File::create(&out_path).map_err(|e| format!("zip create file error: {e}"))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| format!("zip write error: {e}"))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777));
        }
    }
    Ok(())
}

fn extract_targz(archive_path: &Path, target: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("tar.gz open error: {e}"))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(target)
        .map_err(|e| format!("tar.gz extract error: {e}"))
}

/// Set the executable bit where the platform has one.
pub fn mark_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o755)) {
            warn!("install: could not mark {} executable: {err}", path.display());
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
