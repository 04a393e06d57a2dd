/// Normalizes a free-text address into a comparable key
///
/// The key is lower-cased and keeps only ASCII letters and digits. Whitespace,
/// punctuation and separators are dropped, so two addresses that differ only in
/// those characters produce the same key. The key is an index slug, not a
/// uniqueness guarantee.
///
/// # Examples
///
/// ```
/// use slotscout::record::canonicalize_address;
///
/// assert_eq!(canonicalize_address("123 Main St."), "123mainst");
/// ```
pub fn canonicalize_address(address: &str) -> String {
    address
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}
