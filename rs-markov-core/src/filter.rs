/// Returns `true` if `text` starts with any of the configured command prefixes.
///
/// The comparison is a byte-wise prefix match: exact, case-sensitive, no trimming.
/// An empty `text` or an empty prefix list never matches.
pub fn is_command(text: &str, prefixes: &[String]) -> bool {
	if text.is_empty() {
		return false;
	}
	prefixes.iter().any(|prefix| text.as_bytes().starts_with(prefix.as_bytes()))
}
