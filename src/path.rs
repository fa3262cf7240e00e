//! Lexical path arithmetic on forward-slash strings.
//!
//! Archive member names have to be identical no matter which OS built the
//! archive, so every path is converted to `/` separators first and all joins,
//! normalizations and relative computations happen on strings. None of these
//! functions touch the filesystem.

use std::path::Path;

/// Convert native separators to `/`.
pub fn to_posix(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

/// Lossy `Path` to posix string conversion.
pub fn path_to_posix(path: &Path) -> String {
    to_posix(&path.to_string_lossy())
}

/// Split off an absolute prefix: `/`, or a drive like `C:/`.
fn split_prefix(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.first() == Some(&b'/') {
        return path.split_at(1);
    }
    if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/' {
        return path.split_at(3);
    }
    ("", path)
}

pub fn is_absolute(path: &str) -> bool {
    !split_prefix(path).0.is_empty()
}

/// Collapse `.`, `..` and repeated separators.
///
/// `..` never climbs above an absolute prefix; in a relative path leading
/// `..` segments are kept. A trailing separator survives normalization and an
/// empty relative result becomes `.`.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let (prefix, rest) = split_prefix(path);
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if !prefix.is_empty() => {}
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len());
    out.push_str(prefix);
    out.push_str(&segments.join("/"));

    if out.is_empty() {
        return ".".to_string();
    }
    if path.ends_with('/') && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Join segments with `/` and normalize the result.
pub fn join(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

/// Make `path` absolute against `cwd`, without a trailing separator.
pub fn resolve(cwd: &str, path: &str) -> String {
    let resolved = if is_absolute(path) {
        normalize(path)
    } else {
        join(&[cwd, path])
    };
    match resolved.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() && !stripped.ends_with(':') => stripped.to_string(),
        _ => resolved,
    }
}

/// Relative path that leads from `from` to `to`, both resolved against `cwd`.
///
/// Returns an empty string when both name the same location.
pub fn relative(cwd: &str, from: &str, to: &str) -> String {
    let from = resolve(cwd, from);
    let to = resolve(cwd, to);
    if from == to {
        return String::new();
    }

    let (from_prefix, from_rest) = split_prefix(&from);
    let (to_prefix, to_rest) = split_prefix(&to);
    if from_prefix != to_prefix {
        // Different drives share no relative path.
        return to;
    }

    let from_segments: Vec<&str> = from_rest.split('/').filter(|s| !s.is_empty()).collect();
    let to_segments: Vec<&str> = to_rest.split('/').filter(|s| !s.is_empty()).collect();
    let common = from_segments
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = vec![".."; from_segments.len() - common];
    out.extend(&to_segments[common..]);
    out.join("/")
}

/// Name of `src` inside the archive.
///
/// The destination is anchored at the archive root before normalization, so a
/// source outside `root` or a `dst` full of `..` can never produce a name that
/// escapes the archive. The result has no leading separator and may be empty
/// when `src` and `root` coincide.
pub fn archive_path(cwd: &str, root: &str, dst: &str, src: &str) -> String {
    let rel = relative(cwd, root, src);
    let name = join(&["/", dst, &rel]);
    name.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_segments() {
        assert_eq!(normalize("a/./b//c"), "a/b/c");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("../a/../../b"), "../../b");
        assert_eq!(normalize("/../a"), "/a");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("a/.."), ".");
        assert_eq!(normalize("a/b/"), "a/b/");
        assert_eq!(normalize("C:/x/../y"), "C:/y");
    }

    #[test]
    fn join_skips_empty_parts() {
        assert_eq!(join(&["/", "info", "dist/a.txt"]), "/info/dist/a.txt");
        assert_eq!(join(&["/", "", "a"]), "/a");
        assert_eq!(join(&["a", "../b"]), "b");
    }

    #[test]
    fn resolve_against_cwd() {
        assert_eq!(resolve("/work", "dist"), "/work/dist");
        assert_eq!(resolve("/work", "./dist/"), "/work/dist");
        assert_eq!(resolve("/work", "/abs/x"), "/abs/x");
        assert_eq!(resolve("/work", "../up"), "/up");
        assert_eq!(resolve("/work", "/"), "/");
    }

    #[test]
    fn relative_between_paths() {
        assert_eq!(relative("/w", "/w", "/w/dist/a.txt"), "dist/a.txt");
        assert_eq!(relative("/w", "dist", "dist/sub/b.txt"), "sub/b.txt");
        assert_eq!(relative("/w", "dist", "other/c.txt"), "../other/c.txt");
        assert_eq!(relative("/w", "dist", "dist"), "");
        assert_eq!(relative("/w", "/", "/etc/hosts"), "etc/hosts");
    }

    #[test]
    fn archive_path_defaults() {
        assert_eq!(archive_path("/w", "/w", "/", "dist/a.txt"), "dist/a.txt");
        assert_eq!(archive_path("/w", "/w", "/", "/w/dist/sub/b.txt"), "dist/sub/b.txt");
    }

    #[test]
    fn archive_path_root_strips_prefix() {
        assert_eq!(archive_path("/w", "dist", "/", "dist/a.txt"), "a.txt");
        assert_eq!(archive_path("/w", "dist", "/", "dist/sub/b.txt"), "sub/b.txt");
    }

    #[test]
    fn archive_path_dst_prefixes() {
        assert_eq!(archive_path("/w", "/w", "info", "dist/a.txt"), "info/dist/a.txt");
        assert_eq!(archive_path("/w", "dist", "/info/", "dist/a.txt"), "info/a.txt");
        assert_eq!(archive_path("/w", "dist", "a/b", "dist/x"), "a/b/x");
    }

    #[test]
    fn archive_path_never_escapes() {
        assert_eq!(archive_path("/w", "dist", "/", "other/c.txt"), "other/c.txt");
        assert_eq!(archive_path("/w", "a/b", "info", "c.txt"), "c.txt");
        assert_eq!(archive_path("/w", "/w", "../../x", "a.txt"), "x/a.txt");
    }

    #[test]
    fn archive_path_empty_when_source_is_root() {
        assert_eq!(archive_path("/w", "a.txt", "/", "a.txt"), "");
        assert_eq!(archive_path("/w", "a.txt", "info", "a.txt"), "info");
    }
}
