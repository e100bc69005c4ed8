//! URL slugs for catalog entries

/// Lowercase `name` and drop everything that is not an ASCII letter or digit
///
/// `"Steam Deck OLED"` becomes `"steamdeckoled"`.
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
