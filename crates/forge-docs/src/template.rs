//! `{{KEY}}` page templates
//!
//! A template is plain HTML with `{{UPPER_SNAKE}}` placeholders. Values are
//! substituted literally; callers escape anything that came from a manifest.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

static PLACEHOLDER_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\{\{([A-Z][A-Z0-9_]*)\}\}").ok());

pub type TemplateVars = BTreeMap<&'static str, String>;

/// Result of rendering a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders left in the output because no value was supplied
    pub unresolved: BTreeSet<String>,
}

/// Replace every `{{KEY}}` for the keys in `vars` in a single pass.
///
/// Substituted values are never scanned again, so a README that mentions
/// `{{VERSION}}` is rendered as written.
pub fn render(template: &str, vars: &TemplateVars) -> Rendered {
    let mut unresolved = BTreeSet::new();
    let Some(re) = PLACEHOLDER_RE.as_ref() else {
        return Rendered {
            text: template.to_string(),
            unresolved,
        };
    };

    let text = re
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            match vars.get(key) {
                Some(value) => value.clone(),
                None => {
                    unresolved.insert(key.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    Rendered { text, unresolved }
}

/// Escape text for HTML element and attribute content
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub const PLUGIN_TEMPLATE_FILE: &str = "plugin.html";
pub const VERSIONS_TEMPLATE_FILE: &str = "versions.html";
pub const INDEX_TEMPLATE_FILE: &str = "index.html";

const STYLE: &str = "<style>
body{font-family:system-ui,-apple-system,sans-serif;max-width:56rem;margin:2rem auto;padding:0 1rem;color:#1f2328;line-height:1.5}
a{color:#0969da}code,pre{background:#f6f8fa;border-radius:4px}pre{padding:.75rem;overflow:auto}
table{border-collapse:collapse}td,th{border:1px solid #d0d7de;padding:.25rem .5rem;text-align:left}
.badge{background:#1a7f37;color:#fff;border-radius:1em;padding:0 .5em;font-size:.8em}
.muted{color:#59636e}
</style>";

/// Page for one version of one plugin
pub const DEFAULT_PLUGIN_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{PLUGIN_NAME}} {{VERSION}} - {{SITE_TITLE}}</title>
{{STYLE}}
</head>
<body>
<nav><a href="../../../index.html">{{SITE_TITLE}}</a> / <a href="../index.html">{{PLUGIN_NAME}}</a> / v{{VERSION}}</nav>
<h1>{{PLUGIN_NAME}} <small>v{{VERSION}}</small> {{LATEST_BADGE}}</h1>
<p>{{DESCRIPTION}}</p>
<table>
<tr><th>Author</th><td>{{AUTHOR}}</td></tr>
<tr><th>License</th><td>{{LICENSE}}</td></tr>
<tr><th>Homepage</th><td>{{HOMEPAGE}}</td></tr>
<tr><th>Tags</th><td>{{TAGS}}</td></tr>
<tr><th>Download</th><td><a href="{{ARCHIVE_URL}}">{{ARCHIVE_NAME}}</a> ({{ARCHIVE_SIZE}})</td></tr>
</table>
<h2>Commands</h2>
{{COMMANDS}}
<h2>README</h2>
{{README}}
<footer class="muted">Generated {{GENERATED}}</footer>
</body>
</html>
"#;

/// Version list for one plugin
pub const DEFAULT_VERSIONS_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{PLUGIN_NAME}} - {{SITE_TITLE}}</title>
{{STYLE}}
</head>
<body>
<nav><a href="../../index.html">{{SITE_TITLE}}</a> / {{PLUGIN_NAME}}</nav>
<h1>{{PLUGIN_NAME}}</h1>
<p>{{DESCRIPTION}}</p>
<p>Latest: <a href="v{{LATEST_VERSION}}/index.html">v{{LATEST_VERSION}}</a></p>
<h2>Versions</h2>
{{VERSION_LIST}}
<footer class="muted">Generated {{GENERATED}}</footer>
</body>
</html>
"#;

/// Site root listing every plugin
pub const DEFAULT_INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{SITE_TITLE}}</title>
{{STYLE}}
</head>
<body>
<h1>{{SITE_TITLE}}</h1>
<p class="muted">{{PLUGIN_COUNT}} plugin(s)</p>
{{PLUGIN_LIST}}
<footer class="muted">Generated {{GENERATED}} &middot; <a href="versions.json">versions.json</a></footer>
</body>
</html>
"#;

/// The three page templates used for a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    pub plugin: String,
    pub versions: String,
    pub index: String,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            plugin: DEFAULT_PLUGIN_TEMPLATE.to_string(),
            versions: DEFAULT_VERSIONS_TEMPLATE.to_string(),
            index: DEFAULT_INDEX_TEMPLATE.to_string(),
        }
    }
}

fn load_or_default(dir: &Path, file: &str, fallback: &str) -> io::Result<String> {
    let path = dir.join(file);
    if path.is_file() {
        debug!("Using template {:?}", path);
        fs::read_to_string(&path)
    } else {
        debug!("Template {:?} not found, using built-in", path);
        Ok(fallback.to_string())
    }
}

impl TemplateSet {
    /// Load templates from `dir`; any missing file falls back to the built-in page
    pub fn load(dir: &Path) -> io::Result<Self> {
        Ok(Self {
            plugin: load_or_default(dir, PLUGIN_TEMPLATE_FILE, DEFAULT_PLUGIN_TEMPLATE)?,
            versions: load_or_default(dir, VERSIONS_TEMPLATE_FILE, DEFAULT_VERSIONS_TEMPLATE)?,
            index: load_or_default(dir, INDEX_TEMPLATE_FILE, DEFAULT_INDEX_TEMPLATE)?,
        })
    }
}

/// Variables every page gets
pub(crate) fn base_vars(site_title: &str, generated: &str) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("SITE_TITLE", escape_html(site_title));
    vars.insert("GENERATED", escape_html(generated));
    vars.insert("STYLE", STYLE.to_string());
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_replaces_known_keys() {
        let mut vars = TemplateVars::new();
        vars.insert("NAME", "demo".to_string());
        vars.insert("EMPTY", String::new());

        let rendered = render("<h1>{{NAME}}</h1>{{EMPTY}}<p>{{NAME}}</p>", &vars);
        assert_eq!(rendered.text, "<h1>demo</h1><p>demo</p>");
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_placeholders_are_kept_and_reported() {
        let vars = TemplateVars::new();
        let rendered = render("{{MISSING_ONE}} {{lower}} {{MISSING_ONE}}", &vars);
        assert_eq!(rendered.text, "{{MISSING_ONE}} {{lower}} {{MISSING_ONE}}");
        assert_eq!(
            rendered.unresolved.into_iter().collect::<Vec<_>>(),
            vec!["MISSING_ONE".to_string()]
        );
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let mut vars = TemplateVars::new();
        vars.insert("README", "<code>{{VERSION}} {{FOO}}</code>".to_string());
        vars.insert("VERSION", "1.2.3".to_string());

        let rendered = render("{{README}}|{{VERSION}}", &vars);
        assert_eq!(rendered.text, "<code>{{VERSION}} {{FOO}}</code>|1.2.3");
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_load_falls_back_per_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        assert!(fs::write(temp_dir.path().join("index.html"), "<p>{{SITE_TITLE}}</p>").is_ok());

        let Ok(templates) = TemplateSet::load(temp_dir.path()) else {
            panic!("templates should load");
        };
        assert_eq!(templates.index, "<p>{{SITE_TITLE}}</p>");
        assert_eq!(templates.plugin, DEFAULT_PLUGIN_TEMPLATE);
        assert_eq!(templates.versions, DEFAULT_VERSIONS_TEMPLATE);
    }

    #[test]
    fn test_builtin_templates_only_use_known_keys() {
        let mut vars = base_vars("Plugins", "now");
        for key in [
            "PLUGIN_NAME", "VERSION", "LATEST_BADGE", "DESCRIPTION", "AUTHOR", "LICENSE",
            "HOMEPAGE", "TAGS", "ARCHIVE_URL", "ARCHIVE_NAME", "ARCHIVE_SIZE", "COMMANDS",
            "README", "LATEST_VERSION", "VERSION_LIST", "PLUGIN_COUNT", "PLUGIN_LIST",
        ] {
            vars.insert(key, "x".to_string());
        }
        let defaults = TemplateSet::default();
        for template in [&defaults.plugin, &defaults.versions, &defaults.index] {
            assert!(render(template, &vars).unresolved.is_empty());
        }
    }
}
