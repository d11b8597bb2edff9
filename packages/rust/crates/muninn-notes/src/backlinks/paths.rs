//! Reference target resolution against the scan root.

/// Knobs for turning a raw reference target into a root-relative path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Also drop a `?query` suffix. Fragments (`#...`) are always dropped.
    pub strip_query: bool,
}

pub(super) fn normalize_slashes(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// `scheme:` prefix (`http:`, `mailto:`, ...) or protocol-relative `//host`.
fn is_external(target: &str) -> bool {
    if target.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    // Single letters are drive prefixes, not schemes.
    scheme.len() > 1
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Push `candidate`'s segments onto `parts`, folding `.` and `..`.
///
/// Returns `None` when `..` climbs above the root.
fn join_segments(mut parts: Vec<String>, candidate: &str) -> Option<String> {
    for segment in candidate.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other.to_string()),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Normalize a root-relative path (`./notes//a.md` -> `notes/a.md`).
#[must_use]
pub fn normalize_relative_path(raw: &str) -> Option<String> {
    join_segments(Vec::new(), &normalize_slashes(raw.trim()))
}

/// Resolve a reference written inside `source_relative_path` to a
/// root-relative path.
///
/// Relative targets are joined against the source's directory, a leading `/`
/// anchors at the root. Percent escapes in the path are decoded. Returns
/// `None` for external URLs, bare fragments, empty targets and targets
/// escaping the root.
#[must_use]
pub fn resolve_reference(
    raw: &str,
    source_relative_path: &str,
    options: ResolveOptions,
) -> Option<String> {
    let trimmed = raw.trim();
    // [text](<path with spaces.md>)
    let unwrapped = trimmed
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(trimmed);
    let mut candidate = normalize_slashes(unwrapped);
    if candidate.is_empty() || candidate.starts_with('#') || is_external(&candidate) {
        return None;
    }

    if let Some((left, _fragment)) = candidate.split_once('#') {
        candidate = left.to_string();
    }
    if options.strip_query
        && let Some((left, _query)) = candidate.split_once('?')
    {
        candidate = left.to_string();
    }
    // `my%20note.md` names `my note.md`; undecodable input is kept as written.
    if candidate.contains('%')
        && let Ok(decoded) = urlencoding::decode(&candidate)
    {
        candidate = decoded.into_owned();
    }
    if candidate.is_empty() {
        return None;
    }

    let base: Vec<String> = if candidate.starts_with('/') {
        Vec::new()
    } else {
        let source = normalize_slashes(source_relative_path);
        match source.rsplit_once('/') {
            Some((dir, _file)) => dir
                .split('/')
                .filter(|segment| !segment.is_empty() && *segment != ".")
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    };
    join_segments(base, &candidate)
}
