//! String helpers for titles, change messages and HTML fragments.

/// Capitalizes the first character of a string.
///
/// # Examples
///
/// ```
/// use xadmin_rs_core::text::capfirst;
///
/// assert_eq!(capfirst("articles"), "Articles");
/// assert_eq!(capfirst(""), "");
/// ```
pub fn capfirst(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |c| {
        let mut result = c.to_uppercase().to_string();
        result.extend(chars);
        result
    })
}

/// Upper-cases the first letter of every word and lower-cases the rest.
///
/// Word boundaries are any non-alphanumeric character, so `"blog_posts"`
/// becomes `"Blog_Posts"`.
///
/// ```
/// use xadmin_rs_core::text::title;
///
/// assert_eq!(title("blog"), "Blog");
/// assert_eq!(title("my app"), "My App");
/// ```
pub fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_boundary = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if at_boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_boundary = false;
        } else {
            out.push(c);
            at_boundary = true;
        }
    }
    out
}

/// Joins items into a human-readable list with a final conjunction.
///
/// ```
/// use xadmin_rs_core::text::get_text_list;
///
/// assert_eq!(get_text_list(&["a"], "and"), "a");
/// assert_eq!(get_text_list(&["a", "b"], "and"), "a and b");
/// assert_eq!(get_text_list(&["a", "b", "c"], "or"), "a, b or c");
/// ```
pub fn get_text_list<S: AsRef<str>>(items: &[S], last_word: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(AsRef::as_ref).collect();
            format!("{} {last_word} {}", head.join(", "), last.as_ref())
        }
    }
}

/// Truncates a string to at most `n` characters, appending "..." when cut.
///
/// ```
/// use xadmin_rs_core::text::truncate_chars;
///
/// assert_eq!(truncate_chars("Hello, World!", 5), "He...");
/// assert_eq!(truncate_chars("Hi", 10), "Hi");
/// ```
pub fn truncate_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        return s.to_string();
    }
    if n <= 3 {
        return ".".repeat(n);
    }
    let mut result: String = s.chars().take(n - 3).collect();
    result.push_str("...");
    result
}

/// Escapes the five HTML-significant characters.
///
/// ```
/// use xadmin_rs_core::text::escape_html;
///
/// assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
/// ```
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capfirst_unicode() {
        assert_eq!(capfirst("éclair"), "Éclair");
        assert_eq!(capfirst("HELLO"), "HELLO");
    }

    #[test]
    fn test_title_mixed() {
        assert_eq!(title("BLOG posts"), "Blog Posts");
        assert_eq!(title("auth_user"), "Auth_User");
    }

    #[test]
    fn test_get_text_list_empty() {
        let empty: [&str; 0] = [];
        assert_eq!(get_text_list(&empty, "and"), "");
    }

    #[test]
    fn test_get_text_list_owned_strings() {
        let items = vec!["title".to_string(), "body".to_string()];
        assert_eq!(get_text_list(&items, "and"), "title and body");
    }

    #[test]
    fn test_truncate_chars_short_limit() {
        assert_eq!(truncate_chars("abcdef", 2), "..");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_escape_html_plain() {
        assert_eq!(escape_html("plain text"), "plain text");
    }
}
