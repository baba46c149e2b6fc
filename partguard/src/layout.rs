//! File naming conventions: where a descriptor's graphics live and where
//! repaired files are written.
//!
//! Two layouts exist. **Flat** parts keep everything in one directory:
//! `part.<name>.fzp` next to `svg.<view>.<name>.svg`. **Nested** parts follow
//! the parts-library tree: `<root>/<prefix>/<name>.fzp` with graphics under
//! `<root>/svg/<prefix>/<view>/<name>.svg`.

use std::path::{Path, PathBuf};

use crate::core::PartGuardError;
use crate::facts::ViewKind;

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let at = text.len().checked_sub(suffix.len())?;
    let tail = text.get(at..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        text.get(..at)
    } else {
        None
    }
}

/// Whether `path` has the extension `ext`, ignoring case.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Descriptor file name reduced to the part name a `moduleId` should match:
/// `.bak`, `.fzp` and a leading `part.` are removed.
pub fn descriptor_stem(file_name: &str) -> String {
    let mut stem = strip_suffix_ignore_case(file_name, ".bak").unwrap_or(file_name);
    stem = strip_suffix_ignore_case(stem, ".fzp").unwrap_or(stem);
    stem = strip_prefix_ignore_case(stem, "part.").unwrap_or(stem);
    stem.to_string()
}

/// `svg.breadboard.dip_8.svg` gives `dip_8.svg`.
fn strip_flat_graphic_prefix(file_name: &str) -> &str {
    let Some(rest) = strip_prefix_ignore_case(file_name, "svg.") else {
        return file_name;
    };
    match rest.split_once('.') {
        Some((view, name)) if !view.is_empty() && view.chars().all(|c| c.is_alphanumeric() || c == '_') => {
            name
        }
        _ => file_name,
    }
}

/// Text a graphic's `referenceFile` element should hold.
pub fn reference_name(graphic: &Path) -> String {
    let file_name = graphic
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let file_name = strip_suffix_ignore_case(file_name, ".bak").unwrap_or(file_name);
    strip_flat_graphic_prefix(file_name).to_string()
}

/// Guess the view of a graphic checked without its descriptor, from a
/// `svg.<view>.` prefix or the name of its directory.
pub fn infer_view(graphic: &Path) -> Option<ViewKind> {
    let from_name = |name: &str| {
        ViewKind::ALL
            .into_iter()
            .find(|view| name.eq_ignore_ascii_case(view.dir_name()))
    };
    let file_name = graphic.file_name().and_then(|n| n.to_str())?;
    if let Some(rest) = strip_prefix_ignore_case(file_name, "svg.") {
        if let Some(view) = rest.split_once('.').and_then(|(view, _)| from_name(view)) {
            return Some(view);
        }
    }
    let parent = graphic.parent()?.file_name()?.to_str()?;
    from_name(parent)
}

/// If `path` doesn't exist as named but a file differing only in letter
/// case does, return that file's name.
pub fn case_mismatch(path: &Path) -> Option<PathBuf> {
    let wanted = path.file_name()?.to_str()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let entries = std::fs::read_dir(dir).ok()?;
    let mut exact = false;
    let mut other = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name == wanted {
            exact = true;
        } else if name.eq_ignore_ascii_case(wanted) {
            other = Some(dir.join(name));
        }
    }
    if exact {
        None
    } else {
        other
    }
}

/// Where one part's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartLayout {
    /// `part.*.fzp` with `svg.*` graphics in the same directory.
    Flat { dir: PathBuf },
    /// `<root>/<prefix>/*.fzp` with graphics in `<root>/svg/<prefix>/`.
    Nested { root: PathBuf, prefix: String },
}

impl PartLayout {
    /// Work out the layout from a descriptor path.
    pub fn for_descriptor(descriptor: &Path) -> Result<Self, PartGuardError> {
        let file_name = descriptor
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PartGuardError::Layout(format!("'{}' has no file name", descriptor.display())))?;
        let dir = descriptor.parent().unwrap_or(Path::new("")).to_path_buf();

        if strip_prefix_ignore_case(file_name, "part.").is_some() {
            return Ok(PartLayout::Flat { dir });
        }

        let prefix = dir
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty() && *n != "." && *n != "..")
            .ok_or_else(|| {
                PartGuardError::Layout(format!(
                    "'{}' must be inside a prefix directory (such as core/) so its svgs can be found",
                    descriptor.display()
                ))
            })?;
        let root = dir.parent().unwrap_or(Path::new("")).to_path_buf();
        Ok(PartLayout::Nested {
            root,
            prefix: prefix.to_string(),
        })
    }

    /// Path of the graphic a view's `image` attribute names.
    pub fn graphic(&self, image: &str) -> PathBuf {
        match self {
            PartLayout::Flat { dir } => dir.join(format!("svg.{}", image.replace('/', "."))),
            PartLayout::Nested { root, prefix } => root.join("svg").join(prefix).join(image),
        }
    }

    /// Output path of the descriptor under a destination root.
    pub fn output_descriptor(&self, dst: &Path, descriptor: &Path) -> PathBuf {
        let name = descriptor.file_name().unwrap_or_default();
        match self {
            PartLayout::Flat { .. } => dst.join(name),
            PartLayout::Nested { prefix, .. } => dst.join(prefix).join(name),
        }
    }

    /// Output path of a graphic under a destination root.
    pub fn output_graphic(&self, dst: &Path, image: &str) -> PathBuf {
        match self {
            PartLayout::Flat { .. } => dst.join(format!("svg.{}", image.replace('/', "."))),
            PartLayout::Nested { prefix, .. } => dst.join("svg").join(prefix).join(image),
        }
    }
}

/// `<file>.bak` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}
