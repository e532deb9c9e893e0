//! Naming helpers shared by discovery, model typing and operations

/// Separator between namespace segments of a class identifier
pub const NAMESPACE_SEPARATOR: char = '.';

/// Convert string to PascalCase
///
/// Already-PascalCase input is left untouched; SCREAMING_SNAKE_CASE is
/// normalized (`MAX_SIZE` → `MaxSize`).
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    let is_all_caps = s.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c == '-');

    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' || c == NAMESPACE_SEPARATOR {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else if is_all_caps {
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert string to camelCase
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Last namespace segment of a class identifier (`App.Models.Page` → `Page`)
pub fn short_name(class: &str) -> &str {
    class
        .rsplit(NAMESPACE_SEPARATOR)
        .next()
        .unwrap_or(class)
}

/// Naive English plural used for list operation names
pub fn pluralize(name: &str) -> String {
    if name.ends_with('y')
        && !name.ends_with("ay")
        && !name.ends_with("ey")
        && !name.ends_with("oy")
        && !name.ends_with("uy")
    {
        format!("{}ies", &name[..name.len() - 1])
    } else if name.ends_with('s') || name.ends_with('x') || name.ends_with("ch") || name.ends_with("sh") {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}
