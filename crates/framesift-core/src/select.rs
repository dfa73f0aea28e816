//! Frame selection and emission.
//!
//! One running counter spans every configured source directory, in the
//! order given, with entries visited in lexicographic name order. An
//! entry whose name carries the sidecar marker is invisible to the
//! counter; every other entry advances it, and the entry is kept when
//! the counter lands on a multiple of `keep_every`. Kept entries that
//! turn out not to be regular files are dropped without disturbing the
//! numbering, so emitted file names stay reproducible for a given
//! directory layout.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::{load_intrinsics, CameraIntrinsics};
use crate::remap::RemapTable;
use crate::{Error, Result};

/// Entries whose file name contains this marker are calibration or index
/// sidecars, not frames; they are never counted or selected.
const SIDECAR_MARKER: &str = ".ini";

/// Options for one curation pass.
#[derive(Debug, Clone)]
pub struct CurateConfig {
    /// Source directories, processed in the given order.
    pub source_dirs: Vec<PathBuf>,
    /// Keep one out of every `keep_every` counted entries (1 keeps all).
    pub keep_every: usize,
    /// Existing directory that receives the emitted frames.
    pub destination_dir: PathBuf,
    /// Emitted names are `{name_prefix}_{counter}.png`.
    pub name_prefix: String,
    /// Undistort kept frames instead of copying them byte-for-byte.
    pub rectify: bool,
    /// Calibration file, used to resolve intrinsics when `rectify` is set
    /// and no model is supplied up front.
    pub calibration_path: Option<PathBuf>,
}

/// Counters describing one finished curation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurateSummary {
    /// Entries that advanced the running counter.
    pub scanned: usize,
    /// Entries the keep-every-Nth policy landed on.
    pub selected: usize,
    /// Frames copied byte-for-byte.
    pub copied: usize,
    /// Frames decoded, rectified and re-encoded.
    pub rectified: usize,
    /// Selected frames dropped because decoding failed.
    pub decode_failures: usize,
    /// Source directories skipped because they were missing or unreadable.
    pub skipped_dirs: usize,
}

/// Walk the configured source directories and emit every selected frame
/// into the destination directory.
///
/// `intrinsics` is only consulted when `config.rectify` is set; if it is
/// `None` the model is loaded from `config.calibration_path`. Missing
/// source directories and undecodable frames are logged and skipped;
/// destination write failures abort the pass.
pub fn curate(
    config: &CurateConfig,
    intrinsics: Option<&CameraIntrinsics>,
) -> Result<CurateSummary> {
    if config.keep_every == 0 {
        return Err(Error::InvalidConfig(
            "keep_every must be a positive integer".to_string(),
        ));
    }

    let loaded;
    let model = if config.rectify {
        match intrinsics {
            Some(model) => Some(model),
            None => {
                let path = config.calibration_path.as_deref().ok_or_else(|| {
                    Error::InvalidConfig(
                        "rectification requested without intrinsics or a calibration path"
                            .to_string(),
                    )
                })?;
                loaded = load_intrinsics(path)?;
                Some(&loaded)
            }
        }
    } else {
        None
    };

    let mut summary = CurateSummary::default();
    let mut table: Option<RemapTable> = None;
    let mut count: usize = 0;

    for dir in &config.source_dirs {
        if !dir.is_dir() {
            tracing::warn!("source directory {} does not exist, skipping", dir.display());
            summary.skipped_dirs += 1;
            continue;
        }
        let names = match sorted_entries(dir) {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!("cannot list source directory {}: {err}", dir.display());
                summary.skipped_dirs += 1;
                continue;
            }
        };

        for name in names {
            if name.to_string_lossy().contains(SIDECAR_MARKER) {
                continue;
            }
            count += 1;
            summary.scanned += 1;
            if count % config.keep_every != 0 {
                continue;
            }
            summary.selected += 1;

            let source = dir.join(&name);
            if !source.is_file() {
                continue;
            }
            let destination = config
                .destination_dir
                .join(format!("{}_{}.png", config.name_prefix, count));

            if config.rectify {
                let model = model.expect("resolved above when rectify is set");
                if emit_rectified(&source, &destination, model, &mut table)? {
                    summary.rectified += 1;
                } else {
                    summary.decode_failures += 1;
                }
            } else {
                fs::copy(&source, &destination)?;
                summary.copied += 1;
                tracing::info!("copied {} -> {}", source.display(), destination.display());
            }
        }
    }

    Ok(summary)
}

/// Immediate entry names of `dir`, sorted lexicographically.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name());
    }
    names.sort();
    Ok(names)
}

/// Decode, rectify and re-encode one frame. Returns `Ok(false)` when the
/// source cannot be decoded; write failures propagate.
fn emit_rectified(
    source: &Path,
    destination: &Path,
    intrinsics: &CameraIntrinsics,
    table: &mut Option<RemapTable>,
) -> Result<bool> {
    let frame = match image::open(source) {
        Ok(decoded) => decoded.to_rgb8(),
        Err(err) => {
            tracing::warn!("failed to decode {}: {err}", source.display());
            return Ok(false);
        }
    };

    let (width, height) = frame.dimensions();
    if table.as_ref().map_or(true, |t| !t.matches(width, height)) {
        *table = Some(RemapTable::build(intrinsics, width, height));
    }
    let rectified = table.as_ref().expect("table built above").remap(&frame);

    rectified.save(destination).map_err(|err| Error::WriteImage {
        path: destination.to_path_buf(),
        source: err,
    })?;
    tracing::info!(
        "rectified {} -> {}",
        source.display(),
        destination.display()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dest: &Path) -> CurateConfig {
        CurateConfig {
            source_dirs: Vec::new(),
            keep_every: 1,
            destination_dir: dest.to_path_buf(),
            name_prefix: "frame".to_string(),
            rectify: false,
            calibration_path: None,
        }
    }

    #[test]
    fn zero_keep_every_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = config(dir.path());
        cfg.keep_every = 0;
        let err = curate(&cfg, None).expect_err("expected error");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rectify_without_a_model_or_path_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = config(dir.path());
        cfg.rectify = true;
        let err = curate(&cfg, None).expect_err("expected error");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn empty_source_list_yields_an_empty_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let summary = curate(&config(dir.path()), None).expect("empty run");
        assert_eq!(summary, CurateSummary::default());
    }

    #[test]
    fn entry_names_come_back_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.png", "c.png"] {
            std::fs::write(dir.path().join(name), b"x").expect("fixture");
        }
        let names = sorted_entries(dir.path()).expect("listing");
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }
}
