//! Demangler helpers for Rust and C++ (Itanium) symbols.

/// Human-readable form of a mangled symbol, or `None` when `name` is not
/// mangled in a recognised scheme.
pub fn demangle(name: &str) -> Option<String> {
    // Rust (v0 + legacy)
    if let Ok(dm) = rustc_demangle::try_demangle(name) {
        return Some(format!("{dm:#}"));
    }
    if name.starts_with("_Z") {
        if let Ok(sym) = cpp_demangle::Symbol::new(name) {
            return Some(sym.to_string());
        }
    }
    None
}

/// Demangled name, falling back to the raw one.
pub fn display_name(name: &str) -> String {
    demangle(name).unwrap_or_else(|| name.to_string())
}
