// Display-name to filesystem-safe folder name mapping.

/// Characters not allowed in archive folder names on any supported platform.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Derive a filesystem-safe folder name from a project display name.
///
/// Forbidden characters become underscores and surrounding whitespace is
/// trimmed. An empty result falls back to `untitled` so a project can never
/// archive into the projects root itself.
pub fn sanitize_folder_name(display_name: &str) -> String {
    let cleaned: String = display_name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_folder_name;

    #[test]
    fn passes_through_plain_names() {
        assert_eq!(sanitize_folder_name("My Project"), "My Project");
    }

    #[test]
    fn replaces_forbidden_characters() {
        assert_eq!(sanitize_folder_name("a/b\\c:d*e?f"), "a_b_c_d_e_f");
        assert_eq!(sanitize_folder_name("<draft>"), "_draft_");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitize_folder_name("  Final Cut  "), "Final Cut");
    }

    #[test]
    fn empty_name_falls_back() {
        assert_eq!(sanitize_folder_name(""), "untitled");
        assert_eq!(sanitize_folder_name("   "), "untitled");
        assert_eq!(sanitize_folder_name("///"), "___");
    }
}
