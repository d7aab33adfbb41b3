// Bucket naming: turns a project's id and display name into the storage
// bucket identifier the platform provisions for it.

use regex::Regex;
use std::sync::OnceLock;

/// Prefix shared by every project bucket.
pub const BUCKET_PREFIX: &str = "biophonia-0";

fn invalid_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9 _-]").expect("static regex"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_-]+").expect("static regex"))
}

/// Reduce a display name to its bucket slug: `[a-z0-9]` words joined by
/// single hyphens, no hyphen at either end.
pub fn slugify(name: &str) -> String {
    let kept = invalid_chars().replace_all(name, "");
    let hyphenated = separators().replace_all(&kept, "-");
    hyphenated.trim_matches('-').to_lowercase()
}

/// Canonical bucket identifier for a project.
///
/// `normalize(55, "Super Mega (projet de test)")` gives
/// `biophonia-055-super-mega-projet-de-test`. A name with nothing usable
/// left after sanitizing yields the bare `biophonia-0{id}` form.
pub fn normalize(project_id: i64, project_name: &str) -> String {
    let slug = slugify(project_name);
    if slug.is_empty() {
        format!("{BUCKET_PREFIX}{project_id}")
    } else {
        format!("{BUCKET_PREFIX}{project_id}-{slug}")
    }
}
