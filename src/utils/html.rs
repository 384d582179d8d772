use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Question and option text arrives from the content provider as authored
/// markup; this strips dangerous tags (like <script>, <iframe>) and
/// malicious attributes (like onclick) while preserving safe formatting,
/// so provider content can never inject script into the exam surface.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
