//! Disk image archives: format detection, validation and build properties.
//!
//! A disk image is a tar archive, optionally compressed, or a zip package
//! that carries such a tar. Validation reads every tar entry to its end,
//! which exercises header checksums and the decompressor.

use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use flashdeck_core::{StageProgress, WorkerConfig, WorkerError};
use xz2::read::XzDecoder;
use zip::ZipArchive;

use crate::ProgressSink;

pub(crate) const LABEL_EXTRACTING: &str = "Extracting archive";
pub(crate) const LABEL_VALIDATING: &str = "Validating archive";
pub(crate) const LABEL_COMPLETE: &str = "Validation complete";

/// Suffixes stripped from a file name to form the image name, longest first.
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.md5", ".tar.gz", ".tar.xz", ".tar.bz2", ".tbz2", ".tgz", ".txz", ".tar", ".zip",
];

/// Build property keys holding the Android release, in order of preference.
const VERSION_KEYS: &[&str] = &[
    "ro.build.version.release",
    "ro.system.build.version.release",
    "ro.vendor.build.version.release",
];

/// Container format of a disk image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarXz,
    TarBz2,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the file name.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();

        let format = if name.ends_with(".zip") {
            Self::Zip
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Self::TarXz
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Self::TarBz2
        } else if name.ends_with(".tar") || name.ends_with(".tar.md5") {
            Self::Tar
        } else {
            return None;
        };

        Some(format)
    }

    /// Whether this is a (possibly compressed) tar archive.
    pub fn is_tar(self) -> bool {
        !matches!(self, Self::Zip)
    }

    fn decode<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Self::TarGz => Box::new(GzDecoder::new(reader)),
            Self::TarXz => Box::new(XzDecoder::new(reader)),
            Self::TarBz2 => Box::new(BzDecoder::new(reader)),
            Self::Tar | Self::Zip => Box::new(reader),
        }
    }
}

/// Image name derived from the archive file name (`a.tar.md5` → `a`).
pub fn image_name(path: &Path) -> String {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return String::new();
    };

    let lower = name.to_ascii_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .find(|suffix| lower.len() > suffix.len() && lower.ends_with(*suffix))
        .map(|suffix| name[..name.len() - suffix.len()].to_string())
        .unwrap_or(name)
}

/// A slice of the 0-100 progress range assigned to one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: u8,
    pub end: u8,
}

impl Span {
    pub const FULL: Span = Span { start: 0, end: 100 };

    pub fn new(start: u8, end: u8) -> Self {
        Self {
            start: start.min(100),
            end: end.clamp(start.min(100), 100),
        }
    }

    /// The percentage reached after `done` of `total` units.
    pub fn at(self, done: u64, total: u64) -> u8 {
        if total == 0 {
            return self.start;
        }
        let width = u128::from(self.end - self.start);
        let offset = width * u128::from(done.min(total)) / u128::from(total);
        self.start + offset as u8
    }

    /// Split into two consecutive spans at `at`.
    pub fn split(self, at: u8) -> (Span, Span) {
        let at = at.clamp(self.start, self.end);
        (Span::new(self.start, at), Span::new(at, self.end))
    }
}

/// Reports a labelled percentage only when it changes.
struct StageReporter<'a> {
    sink: &'a ProgressSink<StageProgress>,
    label: &'static str,
    last: Option<u8>,
}

impl<'a> StageReporter<'a> {
    fn new(sink: &'a ProgressSink<StageProgress>, label: &'static str) -> Self {
        Self {
            sink,
            label,
            last: None,
        }
    }

    fn report(&mut self, percent: u8) {
        if self.last != Some(percent) {
            self.last = Some(percent);
            self.sink.report(StageProgress::new(self.label, percent));
        }
    }
}

/// Counts bytes pulled from the underlying file.
struct CountingReader<R> {
    inner: R,
    consumed: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.set(self.consumed.get() + n as u64);
        Ok(n)
    }
}

/// Validate the image at `path`, returning the tar archive that was checked.
///
/// Zip packages have their tar extracted into the scratch directory first;
/// the extracted path is returned in that case.
pub(crate) fn validate(
    config: &WorkerConfig,
    path: &Path,
    progress: &ProgressSink<StageProgress>,
    span: Span,
) -> Result<PathBuf, WorkerError> {
    let format = detect_existing(path)?;

    let (tar_path, tar_format, span) = if format.is_tar() {
        (path.to_path_buf(), format, span)
    } else {
        let (extract_span, verify_span) = span.split(span.start + (span.end - span.start) / 2);
        let extracted = extract_tar_from_zip(config, path, progress, extract_span)?;
        let tar_format = ArchiveFormat::detect(&extracted).unwrap_or(ArchiveFormat::Tar);
        (extracted, tar_format, verify_span)
    };

    verify_tar(&tar_path, tar_format, progress, span)?;
    progress.report(StageProgress::new(LABEL_COMPLETE, span.end));

    Ok(tar_path)
}

/// Read the Android release from the image's `build.prop`, if it has one.
pub(crate) fn read_android_version(path: &Path) -> Result<Option<String>, WorkerError> {
    let format = detect_existing(path)?;

    if format.is_tar() {
        let file = File::open(path).map_err(|e| WorkerError::io(path, e))?;
        return version_from_tar(path, format.decode(BufReader::new(file)));
    }

    let mut zip = open_zip(path)?;

    let prop_name = zip
        .file_names()
        .find(|name| is_build_prop(Path::new(name)))
        .map(str::to_owned);
    if let Some(name) = prop_name {
        let mut entry = zip
            .by_name(&name)
            .map_err(|e| WorkerError::archive(path, e))?;
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| WorkerError::archive(path, e))?;
        return Ok(parse_android_version(&String::from_utf8_lossy(&bytes)));
    }

    let Some(name) = find_tar_name(&zip) else {
        return Ok(None);
    };
    let tar_format = ArchiveFormat::detect(Path::new(&name)).unwrap_or(ArchiveFormat::Tar);
    let entry = zip
        .by_name(&name)
        .map_err(|e| WorkerError::archive(path, e))?;
    version_from_tar(path, tar_format.decode(entry))
}

fn detect_existing(path: &Path) -> Result<ArchiveFormat, WorkerError> {
    let metadata = fs::metadata(path).map_err(|e| WorkerError::io(path, e))?;
    if !metadata.is_file() {
        return Err(WorkerError::archive(path, "not a file"));
    }
    ArchiveFormat::detect(path)
        .ok_or_else(|| WorkerError::archive(path, "unsupported image format"))
}

fn verify_tar(
    path: &Path,
    format: ArchiveFormat,
    progress: &ProgressSink<StageProgress>,
    span: Span,
) -> Result<u64, WorkerError> {
    let file = File::open(path).map_err(|e| WorkerError::io(path, e))?;
    let total = file.metadata().map_err(|e| WorkerError::io(path, e))?.len();

    let consumed = Rc::new(Cell::new(0u64));
    let reader = BufReader::new(CountingReader {
        inner: file,
        consumed: Rc::clone(&consumed),
    });
    let mut archive = tar::Archive::new(format.decode(reader));
    let mut reporter = StageReporter::new(progress, LABEL_VALIDATING);
    reporter.report(span.start);

    let mut entries = 0u64;
    for entry in archive
        .entries()
        .map_err(|e| WorkerError::archive(path, e))?
    {
        let mut entry = entry.map_err(|e| WorkerError::archive(path, e))?;
        let expected = entry.size();
        let read = io::copy(&mut entry, &mut io::sink())
            .map_err(|e| WorkerError::archive(path, e))?;
        if read != expected {
            let name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(WorkerError::archive(
                path,
                format!("truncated entry {name} ({read} of {expected} bytes)"),
            ));
        }

        entries += 1;
        reporter.report(span.at(consumed.get(), total));
    }

    if entries == 0 {
        return Err(WorkerError::EmptyArchive {
            path: path.to_path_buf(),
        });
    }

    Ok(entries)
}

fn open_zip(path: &Path) -> Result<ZipArchive<BufReader<File>>, WorkerError> {
    let file = File::open(path).map_err(|e| WorkerError::io(path, e))?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| WorkerError::archive(path, e))
}

fn find_tar_name<R: Read + io::Seek>(zip: &ZipArchive<R>) -> Option<String> {
    zip.file_names()
        .filter(|name| !name.ends_with('/'))
        .find(|name| ArchiveFormat::detect(Path::new(name)).is_some_and(ArchiveFormat::is_tar))
        .map(str::to_owned)
}

fn extract_tar_from_zip(
    config: &WorkerConfig,
    path: &Path,
    progress: &ProgressSink<StageProgress>,
    span: Span,
) -> Result<PathBuf, WorkerError> {
    let mut zip = open_zip(path)?;
    let name = find_tar_name(&zip).ok_or_else(|| WorkerError::MissingTar {
        path: path.to_path_buf(),
    })?;
    let mut entry = zip
        .by_name(&name)
        .map_err(|e| WorkerError::archive(path, e))?;

    let file_name = entry
        .enclosed_name()
        .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        .ok_or_else(|| WorkerError::archive(path, format!("unsafe entry name {name}")))?;

    let dest_dir = config.scratch_dir.join(image_name(path));
    fs::create_dir_all(&dest_dir).map_err(|e| WorkerError::io(&dest_dir, e))?;
    let dest = dest_dir.join(file_name);
    let mut out = File::create(&dest).map_err(|e| WorkerError::io(&dest, e))?;

    let total = entry.size();
    let mut written = 0u64;
    let mut buf = vec![0u8; config.io_buffer_len()];
    let mut reporter = StageReporter::new(progress, LABEL_EXTRACTING);
    reporter.report(span.start);

    loop {
        let n = entry
            .read(&mut buf)
            .map_err(|e| WorkerError::archive(path, e))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])
            .map_err(|e| WorkerError::io(&dest, e))?;
        written += n as u64;
        reporter.report(span.at(written, total));
    }
    out.flush().map_err(|e| WorkerError::io(&dest, e))?;

    Ok(dest)
}

fn version_from_tar<R: Read>(path: &Path, reader: R) -> Result<Option<String>, WorkerError> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive
        .entries()
        .map_err(|e| WorkerError::archive(path, e))?
    {
        let mut entry = entry.map_err(|e| WorkerError::archive(path, e))?;
        let is_prop = entry.path().map(|p| is_build_prop(&p)).unwrap_or(false);
        if !is_prop {
            continue;
        }

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| WorkerError::archive(path, e))?;
        if let Some(version) = parse_android_version(&String::from_utf8_lossy(&bytes)) {
            return Ok(Some(version));
        }
    }

    Ok(None)
}

fn is_build_prop(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == "build.prop")
}

fn parse_android_version(content: &str) -> Option<String> {
    VERSION_KEYS.iter().find_map(|key| {
        content.lines().find_map(|line| {
            let (name, value) = line.trim().split_once('=')?;
            let value = value.trim();
            (name.trim() == *key && !value.is_empty()).then(|| value.to_string())
        })
    })
}
