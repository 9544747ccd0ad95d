//! Destination path planning: template substitution and sanitization.
//!
//! Folder and file name templates come from settings and support the
//! placeholders `animeTitle`, `season`, `seasonPad`, `episode`, `episodePad`,
//! `language`, and `year` (pads are zero-filled to width 2). Unrecognized
//! placeholders are left literal. Every substituted value and every produced
//! path segment is sanitized before joining, so a hostile title can never
//! escape the download root or produce an unwritable name.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Datelike, Utc};
use regex::Regex;

/// Substitution values for one submission.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    title: String,
    season: u32,
    episode: u32,
    language: String,
}

impl TemplateVars {
    /// Captures the per-submission values used by templates.
    #[must_use]
    pub fn new(title: &str, season: u32, episode: u32, language: &str) -> Self {
        Self {
            title: title.to_string(),
            season,
            episode,
            language: language.to_string(),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "animeTitle" => Some(self.title.clone()),
            "season" => Some(self.season.to_string()),
            "seasonPad" => Some(format!("{:02}", self.season)),
            "episode" => Some(self.episode.to_string()),
            "episodePad" => Some(format!("{:02}", self.episode)),
            "language" => Some(self.language.clone()),
            "year" => Some(Utc::now().year().to_string()),
            _ => None,
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\{([A-Za-z]+)\}").expect("static placeholder pattern is valid")
    })
}

/// Replaces recognized placeholders with sanitized values.
///
/// Unknown placeholders stay literal so template typos are visible in the
/// produced path instead of silently vanishing.
#[must_use]
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match vars.lookup(&caps[1]) {
                Some(value) => sanitize_component(&value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replaces filesystem-unsafe characters in one path component.
///
/// The unsafe set matches what mainstream filesystems reject
/// (`< > : " / \ | ? *`) plus control characters.
#[must_use]
pub fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Computes the full destination path for a submission.
///
/// The folder template may contain separators to express a hierarchy; each
/// resulting segment is sanitized independently, then joined under `root`.
/// Empty segments (doubled separators, templates resolving to nothing)
/// are dropped.
#[must_use]
pub fn plan_destination(
    root: &Path,
    folder_template: &str,
    filename_template: &str,
    vars: &TemplateVars,
) -> PathBuf {
    let folder = render_template(folder_template, vars);
    let mut path = root.to_path_buf();
    for segment in folder.split(['/', '\\']) {
        let safe = sanitize_component(segment);
        if !safe.is_empty() {
            path.push(safe);
        }
    }
    let file_name = sanitize_component(&render_template(filename_template, vars));
    path.push(file_name);
    path
}

/// Returns `path` with a numeric suffix inserted before the extension.
///
/// `"ep.mp4"` with suffix 2 becomes `"ep_2.mp4"`.
#[must_use]
pub fn with_suffix(path: &Path, suffix: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    let candidate = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(candidate)
}

/// Finds the first path not claimed by `is_taken`, suffixing `_2`, `_3`, ….
///
/// Used by the scheduler so two submissions whose templates collapse to the
/// same sanitized path can never silently overwrite each other.
#[must_use]
pub fn resolve_collision(path: PathBuf, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(&path) {
        return path;
    }
    let mut suffix = 2;
    loop {
        let candidate = with_suffix(&path, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
