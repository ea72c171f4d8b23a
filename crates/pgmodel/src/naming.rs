//! Table-name inference from model names.

/// English plural of a lowercase noun, good enough for table names.
///
/// `category` → `categories`, `box` → `boxes`, `file` → `files`.
pub fn pluralize(base: &str) -> String {
    if let Some(stem) = base.strip_suffix('y')
        && stem.chars().last().is_some_and(|c| !"aeiou".contains(c))
    {
        return format!("{stem}ies");
    }
    const SIBILANTS: [&str; 5] = ["s", "x", "z", "ch", "sh"];
    if SIBILANTS.iter().any(|end| base.ends_with(end)) {
        format!("{base}es")
    } else {
        format!("{base}s")
    }
}

/// Table name for a model: the lowercased model name, pluralized when `pluralize_tables` is set.
pub fn table_name_for(model_name: &str, pluralize_tables: bool) -> String {
    let lower = model_name.to_lowercase();
    if pluralize_tables && !lower.is_empty() {
        pluralize(&lower)
    } else {
        lower
    }
}
