//! SVG export: payload sanitization and rendering.
//!
//! The export payload was already redacted by the tool flow; this pass
//! bounds size and shape before anything is rendered. Clipping always
//! sets the `truncated` flag so clients can tell.

use serde_json::Value;

use astrea_domain::ids::user_hash;

const MAX_TITLE_CHARS: usize = 120;
const MAX_STRING_CHARS: usize = 2_000;
const MAX_CONTAINER_ENTRIES: usize = 64;
const MAX_DEPTH: usize = 6;
const MAX_RENDER_LINES: usize = 80;

pub struct SanitizedExport {
    pub title: String,
    pub body: Value,
    pub truncated: bool,
}

/// Bound the export payload by size and type.
pub fn sanitize_export(title: Option<&str>, safe_json: &Value) -> SanitizedExport {
    let mut truncated = false;

    let raw_title = title.unwrap_or("Export").trim();
    let raw_title = if raw_title.is_empty() { "Export" } else { raw_title };
    let title = if raw_title.chars().count() > MAX_TITLE_CHARS {
        truncated = true;
        raw_title.chars().take(MAX_TITLE_CHARS).collect()
    } else {
        raw_title.to_owned()
    };

    let body = clip_value(safe_json, 0, &mut truncated);

    SanitizedExport {
        title,
        body,
        truncated,
    }
}

fn clip_value(value: &Value, depth: usize, truncated: &mut bool) -> Value {
    if depth >= MAX_DEPTH {
        *truncated = true;
        return Value::Null;
    }

    match value {
        Value::String(s) => {
            if s.chars().count() > MAX_STRING_CHARS {
                *truncated = true;
                Value::String(s.chars().take(MAX_STRING_CHARS).collect())
            } else {
                value.clone()
            }
        }
        Value::Array(items) => {
            if items.len() > MAX_CONTAINER_ENTRIES {
                *truncated = true;
            }
            Value::Array(
                items
                    .iter()
                    .take(MAX_CONTAINER_ENTRIES)
                    .map(|v| clip_value(v, depth + 1, truncated))
                    .collect(),
            )
        }
        Value::Object(map) => {
            if map.len() > MAX_CONTAINER_ENTRIES {
                *truncated = true;
            }
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter().take(MAX_CONTAINER_ENTRIES) {
                out.insert(k.clone(), clip_value(v, depth + 1, truncated));
            }
            Value::Object(out)
        }
        primitive => primitive.clone(),
    }
}

/// Object-store key: `artifacts/<user-hash>/<random>.svg`.
pub fn artifact_key(user_id: &str) -> String {
    format!(
        "artifacts/{}/{}.svg",
        user_hash(user_id),
        uuid::Uuid::new_v4().simple()
    )
}

/// Render the sanitized export as a standalone SVG document.
pub fn render_svg(export: &SanitizedExport) -> String {
    let pretty = serde_json::to_string_pretty(&export.body).unwrap_or_else(|_| "{}".into());
    let lines: Vec<&str> = pretty.lines().take(MAX_RENDER_LINES).collect();

    let width = 720;
    let height = 64 + 18 * (lines.len() as u32 + 1);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\">\n"
    ));
    svg.push_str(&format!(
        "  <rect width=\"{width}\" height=\"{height}\" fill=\"#101418\"/>\n"
    ));
    svg.push_str(&format!(
        "  <text x=\"24\" y=\"36\" fill=\"#e8e4da\" font-family=\"monospace\" \
         font-size=\"18\">{}</text>\n",
        xml_escape(&export.title)
    ));

    for (i, line) in lines.iter().enumerate() {
        let y = 64 + 18 * i as u32;
        svg.push_str(&format!(
            "  <text x=\"24\" y=\"{y}\" fill=\"#9fb4c7\" font-family=\"monospace\" \
             font-size=\"12\">{}</text>\n",
            xml_escape(line)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn small_payload_is_untouched() {
        let out = sanitize_export(Some("t"), &json!({ "a": 1, "b": "two" }));
        assert!(!out.truncated);
        assert_eq!(out.title, "t");
        assert_eq!(out.body, json!({ "a": 1, "b": "two" }));
    }

    #[test]
    fn long_title_and_strings_are_clipped() {
        let long = "x".repeat(5_000);
        let out = sanitize_export(Some(&"t".repeat(500)), &json!({ "s": long }));
        assert!(out.truncated);
        assert_eq!(out.title.chars().count(), 120);
        assert_eq!(out.body["s"].as_str().unwrap().chars().count(), 2_000);
    }

    #[test]
    fn deep_nesting_is_cut_off() {
        let deep = json!({ "a": { "b": { "c": { "d": { "e": { "f": { "g": 1 } } } } } } });
        let out = sanitize_export(None, &deep);
        assert!(out.truncated);
        assert_eq!(out.title, "Export");
    }

    #[test]
    fn svg_escapes_markup() {
        let export = sanitize_export(Some("<script>"), &json!({ "k": "a<b&c" }));
        let svg = render_svg(&export);
        assert!(svg.starts_with("<svg "));
        assert!(svg.contains("&lt;script&gt;"));
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("a&lt;b&amp;c"));
    }

    #[test]
    fn artifact_keys_hash_the_user_and_are_unique() {
        let a = artifact_key("user-1");
        let b = artifact_key("user-1");
        assert!(a.starts_with("artifacts/"));
        assert!(a.ends_with(".svg"));
        assert_ne!(a, b);
        assert!(!a.contains("user-1"));

        let prefix_a: Vec<&str> = a.split('/').collect();
        let prefix_b: Vec<&str> = b.split('/').collect();
        assert_eq!(prefix_a[1], prefix_b[1]);
    }
}
