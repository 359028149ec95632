//! Browser file → editor file matching
//!
//! [`auto_map`] guesses which editor file backs each browser stylesheet by
//! comparing path segments right to left. [`resolve_mapping`] layers the
//! user's overrides on top and keeps only pairs whose both sides currently
//! exist.

use std::collections::HashSet;

use livestyle_core::Mapping;

/// Best-guess mapping for every browser file that has a candidate.
///
/// For each browser file:
/// 1. Candidates are editor files with the same basename, compared with or
///    without the extension (`style.css` matches `style.less`).
/// 2. Trailing segments are compared one further step at a time; a step that
///    would eliminate every candidate is discarded and narrowing stops.
/// 3. The first remaining candidate, in `editor_files` order, wins. Equally
///    good candidates are therefore resolved by input order.
pub fn auto_map(browser_files: &[String], editor_files: &[String]) -> Mapping {
    let editor: Vec<(&String, Vec<&str>)> = editor_files
        .iter()
        .map(|file| (file, segments(file)))
        .collect();

    browser_files
        .iter()
        .filter_map(|browser| {
            best_candidate(&segments(browser), &editor).map(|file| (browser.clone(), file.clone()))
        })
        .collect()
}

fn best_candidate<'a>(browser: &[&str], editor: &[(&'a String, Vec<&str>)]) -> Option<&'a String> {
    let (basename, _) = browser.split_last()?;

    let mut candidates: Vec<&(&String, Vec<&str>)> = editor
        .iter()
        .filter(|(_, segs)| segs.last().is_some_and(|last| same_basename(last, basename)))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    // depth = number of trailing segments compared so far
    for depth in 2..=browser.len() {
        let wanted = browser[browser.len() - depth];
        let narrowed: Vec<_> = candidates
            .iter()
            .copied()
            .filter(|(_, segs)| segs.len() >= depth && segs[segs.len() - depth] == wanted)
            .collect();
        if narrowed.is_empty() {
            break;
        }
        candidates = narrowed;
    }

    candidates.first().map(|(file, _)| *file)
}

fn same_basename(a: &str, b: &str) -> bool {
    a == b || strip_extension(a) == strip_extension(b)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Path segments with query string and fragment removed.
///
/// Absolute URLs contribute their path only.
fn segments(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => path,
    };
    path.split('/').filter(|seg| !seg.is_empty()).collect()
}

/// Effective mapping for a session.
///
/// User overrides replace auto entries only when both sides exist; every pair
/// in the result has its key in `stylesheets` and its value in
/// `editor_files`.
pub fn resolve_mapping(
    stylesheets: &[String],
    editor_files: &[String],
    auto: &Mapping,
    user: &Mapping,
) -> Mapping {
    let browser: HashSet<&str> = stylesheets.iter().map(String::as_str).collect();
    let editor: HashSet<&str> = editor_files.iter().map(String::as_str).collect();
    let valid = |b: &str, e: &str| browser.contains(b) && editor.contains(e);

    let mut mapping: Mapping = auto
        .iter()
        .filter(|(b, e)| valid(b.as_str(), e.as_str()))
        .map(|(b, e)| (b.clone(), e.clone()))
        .collect();
    mapping.extend(
        user.iter()
            .filter(|(b, e)| valid(b.as_str(), e.as_str()))
            .map(|(b, e)| (b.clone(), e.clone())),
    );
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_narrowing_keeps_last_nonempty_set() {
        let browser = files(&["/assets/css/file1.css", "/assets/css/file2.css"]);
        let editor = files(&["/assets/css/file1.css", "/src/css2/file2.css"]);

        let mapping = auto_map(&browser, &editor);

        assert_eq!(
            mapping,
            Mapping::from([
                ("/assets/css/file1.css".into(), "/assets/css/file1.css".into()),
                ("/assets/css/file2.css".into(), "/src/css2/file2.css".into()),
            ])
        );
    }

    #[test]
    fn test_deeper_match_wins() {
        let browser = files(&["/static/theme/main.css"]);
        let editor = files(&["/project/other/main.css", "/project/theme/main.css"]);

        let mapping = auto_map(&browser, &editor);
        assert_eq!(mapping["/static/theme/main.css"], "/project/theme/main.css");
    }

    #[test]
    fn test_tie_break_is_input_order() {
        let browser = files(&["/a/main.css"]);
        let first = files(&["/x/main.css", "/y/main.css"]);
        let second = files(&["/y/main.css", "/x/main.css"]);

        assert_eq!(auto_map(&browser, &first)["/a/main.css"], "/x/main.css");
        assert_eq!(auto_map(&browser, &second)["/a/main.css"], "/y/main.css");
    }

    #[test]
    fn test_deterministic() {
        let browser = files(&["/a/b/c.css", "/d.css", "/q/style.css?v=3"]);
        let editor = files(&["/src/b/c.less", "/src/c.css", "/style.scss", "/d.css"]);
        assert_eq!(auto_map(&browser, &editor), auto_map(&browser, &editor));
    }

    #[test]
    fn test_extension_agnostic_and_query_stripped() {
        let browser = files(&["http://localhost:8080/css/style.css?v=12"]);
        let editor = files(&["/work/less/style.less"]);

        let mapping = auto_map(&browser, &editor);
        assert_eq!(
            mapping["http://localhost:8080/css/style.css?v=12"],
            "/work/less/style.less"
        );
    }

    #[test]
    fn test_no_candidate_is_unmapped() {
        let mapping = auto_map(&files(&["/a.css"]), &files(&["/b.css"]));
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_segments() {
        assert_eq!(segments("http://host:1/a/b.css?x#y"), vec!["a", "b.css"]);
        assert_eq!(segments("/a//b.css"), vec!["a", "b.css"]);
        assert!(segments("http://host").is_empty());
    }

    #[test]
    fn test_stale_user_override_falls_back_to_auto() {
        let stylesheets = files(&["/a.css"]);
        let editor = files(&["/src/a.css"]);
        let auto = auto_map(&stylesheets, &editor);
        let user = Mapping::from([("/a.css".into(), "/missing-editor-file.css".into())]);

        let mapping = resolve_mapping(&stylesheets, &editor, &auto, &user);
        assert_eq!(mapping, Mapping::from([("/a.css".into(), "/src/a.css".into())]));
    }

    #[test]
    fn test_stale_override_without_auto_entry_is_omitted() {
        let stylesheets = files(&["/a.css"]);
        let user = Mapping::from([("/a.css".into(), "/missing-editor-file.css".into())]);

        let mapping = resolve_mapping(&stylesheets, &[], &Mapping::new(), &user);
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_valid_user_override_wins() {
        let stylesheets = files(&["/a.css"]);
        let editor = files(&["/src/a.css", "/other/theme.css"]);
        let auto = auto_map(&stylesheets, &editor);
        let user = Mapping::from([("/a.css".into(), "/other/theme.css".into())]);

        let mapping = resolve_mapping(&stylesheets, &editor, &auto, &user);
        assert_eq!(mapping["/a.css"], "/other/theme.css");
    }

    #[test]
    fn test_filter_invariant() {
        let stylesheets = files(&["/a.css"]);
        let editor = files(&["/src/a.css"]);
        let auto = Mapping::from([
            ("/a.css".into(), "/gone.css".into()),
            ("/gone.css".into(), "/src/a.css".into()),
        ]);
        let user = Mapping::from([("/x.css".into(), "/src/a.css".into())]);

        let mapping = resolve_mapping(&stylesheets, &editor, &auto, &user);
        for (browser, file) in &mapping {
            assert!(stylesheets.contains(browser));
            assert!(editor.contains(file));
        }
        assert!(mapping.is_empty());
    }
}
