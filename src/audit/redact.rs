use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::constants::AGSYNC_DIR;
use crate::utils::fs::to_slash;

const PROJECT_LABEL: &str = "<project>";
const GLOBAL_LABEL: &str = "<global>";
const HOME_LABEL: &str = "~";
const EXTERNAL_LABEL: &str = "<external>";

/// Rewrites absolute paths relative to known roots before they leave the process.
///
/// The most specific root wins, so a path inside `~/.agsync` is reported as
/// `<global>/...` rather than `~/.agsync/...`.
#[derive(Debug, Clone, Default)]
pub struct PathRedactor {
    /// `(root, label)`, most specific first
    roots: Vec<(PathBuf, &'static str)>,
}

impl PathRedactor {
    pub fn new(project_root: Option<PathBuf>, global_root: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        let mut roots = Vec::new();
        for (root, label) in [
            (project_root, PROJECT_LABEL),
            (global_root, GLOBAL_LABEL),
            (home, HOME_LABEL),
        ] {
            let Some(root) = root else { continue };
            // Temp dirs on macOS live behind a /var -> /private/var symlink
            if let Ok(canonical) = root.canonicalize() {
                if canonical != root {
                    roots.push((canonical, label));
                }
            }
            roots.push((root, label));
        }
        roots.sort_by(|a, b| b.0.components().count().cmp(&a.0.components().count()));
        Self {
            roots,
        }
    }

    /// Redactor for a project, with the global root and home taken from the environment.
    #[must_use]
    pub fn for_project(project_root: &Path) -> Self {
        let home = dirs::home_dir();
        let global = home.as_ref().map(|h| h.join(AGSYNC_DIR));
        Self::new(Some(project_root.to_path_buf()), global, home)
    }

    /// Redact a single path.
    #[must_use]
    pub fn redact_path(&self, path: &Path) -> String {
        if !path.is_absolute() {
            return to_slash(path);
        }

        for (root, label) in &self.roots {
            if let Ok(rest) = path.strip_prefix(root) {
                let rest = to_slash(rest);
                return if rest.is_empty() {
                    (*label).to_string()
                } else {
                    format!("{label}/{rest}")
                };
            }
        }

        match path.file_name() {
            Some(name) => format!("{EXTERNAL_LABEL}/{}", name.to_string_lossy()),
            None => EXTERNAL_LABEL.to_string(),
        }
    }

    /// Substitute known roots inside free text (error messages, details).
    ///
    /// Absolute paths outside every known root are cut down to
    /// `<external>/<file_name>`.
    #[must_use]
    pub fn redact_text(&self, text: &str) -> String {
        let mut roots: Vec<(String, &'static str)> = self
            .roots
            .iter()
            .map(|(root, label)| (root.to_string_lossy().into_owned(), *label))
            .filter(|(root, _)| root.len() > 1)
            .collect();
        roots.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = text.to_string();
        for (root, label) in roots {
            out = replace_at_boundaries(&out, &root, label);
        }

        match absolute_path_regex() {
            Some(re) => re
                .replace_all(&out, |caps: &Captures| {
                    format!("{}{}", &caps[1], self.redact_path(Path::new(&caps[2])))
                })
                .into_owned(),
            None => out,
        }
    }
}

/// A `/`-rooted token that starts a word; `https://` and `<project>/` never match.
fn absolute_path_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(^|[\s'"(=\[])(/[^\s'"),\]]+)"#).ok()).as_ref()
}

/// Replace `needle` only where it is followed by a separator or the end of a path.
fn replace_at_boundaries(haystack: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(idx) = rest.find(needle) {
        let after = &rest[idx + needle.len()..];
        let at_boundary = after
            .chars()
            .next()
            .is_none_or(|c| c == '/' || c == '\\' || c.is_whitespace() || matches!(c, '\'' | '"' | ')' | ':' | ','));
        out.push_str(&rest[..idx]);
        if at_boundary {
            out.push_str(replacement);
        } else {
            out.push_str(needle);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redactor() -> PathRedactor {
        PathRedactor::new(
            Some(PathBuf::from("/home/dev/work/app")),
            Some(PathBuf::from("/home/dev/.agsync")),
            Some(PathBuf::from("/home/dev")),
        )
    }

    #[test]
    fn test_most_specific_root_wins() {
        let r = redactor();
        assert_eq!(r.redact_path(Path::new("/home/dev/work/app/.claude/agents/a.md")), "<project>/.claude/agents/a.md");
        assert_eq!(r.redact_path(Path::new("/home/dev/.agsync/cache/x")), "<global>/cache/x");
        assert_eq!(r.redact_path(Path::new("/home/dev/.cursor/skills")), "~/.cursor/skills");
        assert_eq!(r.redact_path(Path::new("/home/dev/work/app")), "<project>");
    }

    #[test]
    fn test_external_paths_keep_only_file_name() {
        let r = redactor();
        assert_eq!(r.redact_path(Path::new("/srv/other/secret/SKILL.md")), "<external>/SKILL.md");
        assert_eq!(r.redact_path(Path::new("relative/path.md")), "relative/path.md");
    }

    #[test]
    fn test_redact_text_respects_boundaries() {
        let r = redactor();
        assert_eq!(
            r.redact_text("failed: /home/dev/work/app/x and /home/dev/.agsync/state"),
            "failed: <project>/x and <global>/state"
        );
        assert_eq!(r.redact_text("/home/devops/file"), "<external>/file");
        assert_eq!(r.redact_text("in '/home/dev'"), "in '~'");
    }

    #[test]
    fn test_redact_text_hides_unknown_absolute_paths() {
        let r = redactor();
        assert_eq!(
            r.redact_text("cannot read /srv/private/skills/y: denied"),
            "cannot read <external>/y: denied"
        );
        assert_eq!(r.redact_text("copied (/srv/private/x)"), "copied (<external>/x)");
        // URLs, relative paths and labels are left alone
        assert_eq!(
            r.redact_text("fetched https://github.com/acme/skills into <project>/.claude"),
            "fetched https://github.com/acme/skills into <project>/.claude"
        );
        assert_eq!(r.redact_text("frontend/react"), "frontend/react");
    }
}
