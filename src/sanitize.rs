/// Normalize an archive-internal path into a relative path that stays
/// inside the output root.
///
/// Backslashes become `/`, leading slashes are dropped, and `.`/empty
/// components are removed. A `..` removes the component before it, or is
/// dropped when there is nothing left to climb out of.
pub fn sanitize(rel_path: &str) -> String {
    let unified = rel_path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for part in unified.trim_start_matches('/').split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    parts.join("/")
}
