use davit_storage::Entry;
use std::collections::HashSet;

/// Render the directory index for `path` in the exact wire format Maven
/// clients and browsers expect from this server.
pub fn render_index(path: &str, entries: &[Entry]) -> String {
    let mut html = format!("<html><body><h1>Index of /{path}</h1><hr><ul>");
    html.push_str("<li><a href=\"../\">../</a></li>");
    for entry in entries {
        let slash = if entry.is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{name}{slash}\">{name}{slash}</a> (Size: {size})</li>",
            name = entry.name,
            size = entry.size,
        ));
    }
    html.push_str("</ul><hr></body></html>");
    html
}

/// First occurrence of a name wins; callers feed repositories in
/// releases-first order, so a release entry shadows its snapshot twin.
pub fn dedup_entries(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.name.clone()))
        .collect()
}
