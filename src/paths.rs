//! `/`-separated asset path helpers.

/// Join `relative` onto `base` and fold away `.` and `..` segments.
///
/// Both inputs may use `/` or `\`. Parent segments that climb above `base`
/// are kept, so `join_asset_path("tilesets", "../../shared/a.png")` is
/// `../shared/a.png`.
pub(crate) fn join_asset_path(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in base.split(['/', '\\']).chain(relative.split(['/', '\\'])) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

/// Directory portion of a `/`-separated path, empty when there is none.
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rfind(['/', '\\']).map_or("", |i| &path[..i])
}
