use super::path::split_extension;
use super::StructuringError;

/// Resolve `candidate` to a path nobody else holds.
///
/// `is_taken` is consulted for each attempt; on a hit, `_v{n}` (n = 1, 2, …)
/// is inserted before the extension of the last segment. A candidate equal
/// to `current_path` is accepted as-is: the document already owns it.
/// Gives up with [`StructuringError::CollisionLimit`] after `max_attempts`
/// checks.
pub fn resolve_collision<F>(
    candidate: &str,
    current_path: &str,
    max_attempts: u32,
    mut is_taken: F,
) -> Result<String, StructuringError>
where
    F: FnMut(&str) -> Result<bool, StructuringError>,
{
    let mut attempt = candidate.to_string();
    let mut checks = 0u32;
    let mut version = 0u32;

    loop {
        if attempt == current_path {
            return Ok(attempt);
        }
        if checks >= max_attempts {
            return Err(StructuringError::CollisionLimit {
                candidate: candidate.to_string(),
                attempts: checks,
            });
        }
        checks += 1;
        if !is_taken(&attempt)? {
            if version > 0 {
                tracing::debug!(candidate, resolved = %attempt, "Path collision resolved");
            }
            return Ok(attempt);
        }
        version += 1;
        attempt = versioned_path(candidate, version);
    }
}

/// `a/b/report.pdf` + 2 → `a/b/report_v2.pdf`; `a/noext` + 1 → `a/noext_v1`.
pub fn versioned_path(path: &str, version: u32) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let versioned = match split_extension(file) {
        (stem, Some(ext)) => format!("{stem}_v{version}.{ext}"),
        (stem, None) => format!("{stem}_v{version}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{versioned}"),
        None => versioned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn taken<'a>(paths: &'a [&'a str]) -> impl FnMut(&str) -> Result<bool, StructuringError> + 'a {
        let set: HashSet<&str> = paths.iter().copied().collect();
        move |p| Ok(set.contains(p))
    }

    #[test]
    fn free_candidate_returned_unchanged() {
        let path = resolve_collision("a.pdf", "tmp/1-a.pdf", 10, taken(&[])).unwrap();
        assert_eq!(path, "a.pdf");
    }

    #[test]
    fn skips_taken_versions() {
        let path = resolve_collision("a.pdf", "tmp/1-a.pdf", 10, taken(&["a.pdf", "a_v1.pdf"])).unwrap();
        assert_eq!(path, "a_v2.pdf");
    }

    #[test]
    fn candidate_equal_to_current_needs_no_check() {
        let mut calls = 0;
        let path = resolve_collision("General/x.pdf", "General/x.pdf", 10, |_| {
            calls += 1;
            Ok(true)
        })
        .unwrap();
        assert_eq!(path, "General/x.pdf");
        assert_eq!(calls, 0);
    }

    #[test]
    fn versioned_current_path_is_kept() {
        // Document previously landed on a_v1 because a.pdf belonged to someone else.
        let path =
            resolve_collision("d/a.pdf", "d/a_v1.pdf", 10, taken(&["d/a.pdf", "d/a_v1.pdf"])).unwrap();
        assert_eq!(path, "d/a_v1.pdf");
    }

    #[test]
    fn version_goes_before_extension_of_last_segment() {
        assert_eq!(versioned_path("Doe_Jane_AB.1/RH/Invoice/report.pdf", 3), "Doe_Jane_AB.1/RH/Invoice/report_v3.pdf");
        assert_eq!(versioned_path("General/noext", 1), "General/noext_v1");
        assert_eq!(versioned_path("x.tar.gz", 1), "x.tar_v1.gz");
    }

    #[test]
    fn gives_up_after_ceiling() {
        let err = resolve_collision("a.pdf", "tmp/a.pdf", 3, |_| Ok(true)).unwrap_err();
        match err {
            StructuringError::CollisionLimit { candidate, attempts } => {
                assert_eq!(candidate, "a.pdf");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn existence_check_errors_propagate() {
        let err = resolve_collision("a.pdf", "tmp/a.pdf", 3, |p| {
            Err(crate::storage::StorageError::io(p, "offline").into())
        })
        .unwrap_err();
        assert!(matches!(err, StructuringError::Storage(_)));
    }
}
