use crate::file::FileHandle;

/// Picks the content type to upload `file` under `name` with.
///
/// The first non-empty answer wins: the type declared on the handle, the
/// type declared on the file it wraps, a guess from the name's extension,
/// then `default`. File bytes are never inspected.
pub fn resolve(name: &str, file: &dyn FileHandle, default: &str) -> String {
    declared(file)
        .or_else(|| guess_from_name(name))
        .unwrap_or_else(|| default.to_string())
}

fn declared(file: &dyn FileHandle) -> Option<String> {
    non_empty(file.content_type())
        .or_else(|| file.wrapped().and_then(|inner| non_empty(inner.content_type())))
        .map(str::to_owned)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn guess_from_name(name: &str) -> Option<String> {
    mime_guess::from_path(name).first_raw().map(str::to_owned)
}
