/// Lowercase, split on whitespace, keep only alphanumeric characters of each
/// token and drop tokens that end up empty.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect::<String>())
        .filter(|t| !t.is_empty())
        .collect()
}
