use std::fmt;

pub const SUPPORTED: [Locale; 2] = [Locale::En, Locale::My];
pub const DEFAULT: Locale = Locale::En;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    My,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::My => "my",
        }
    }

    pub fn parse(text: &str) -> Option<Locale> {
        match text {
            "en" => Some(Locale::En),
            "my" => Some(Locale::My),
            _ => None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// first supported code that appears in the Accept-Language header wins
pub fn negotiate(accept_language: Option<&str>) -> Locale {
    if let Some(header) = accept_language {
        for locale in SUPPORTED {
            if header.contains(locale.as_str()) {
                return locale;
            }
        }
    }
    DEFAULT
}

// static assets and raw api paths are never locale-prefixed
pub fn is_passthrough(path: &str) -> bool {
    path.starts_with("/api") || path.contains('.')
}

// where to send a request whose path lacks a valid locale prefix, if anywhere
pub fn redirect_target(path: &str, query: &str, accept_language: Option<&str>) -> Option<String> {
    if is_passthrough(path) {
        return None;
    }

    let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
    if Locale::parse(first).is_some() {
        return None;
    }

    // two-letter segments are treated as unrecognized locales and fall back to
    // the default; anything else keeps its path under the negotiated locale
    let target = if first.len() == 2 && first.chars().all(|c| c.is_ascii_lowercase()) {
        let rest = &path[1 + first.len()..];
        format!("/{}{rest}", DEFAULT)
    } else {
        format!("/{}{path}", negotiate(accept_language))
    };

    if query.is_empty() {
        Some(target)
    } else {
        Some(format!("{target}?{query}"))
    }
}

// guest-only pages bounce unauthenticated visitors here
pub fn login_redirect(locale: Locale, path: &str) -> String {
    format!("/{locale}/login?next={}", percent_encode(path))
}

pub(crate) fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_negotiate() {
        assert_eq!(negotiate(None), Locale::En);
        assert_eq!(negotiate(Some("my,en;q=0.9")), Locale::En);
        assert_eq!(negotiate(Some("my;q=0.9")), Locale::My);
        assert_eq!(negotiate(Some("fr-FR,fr;q=0.9")), Locale::En);
    }

    #[test]
    fn test_prefixed_paths_pass() {
        assert_eq!(redirect_target("/en/rooms", "", None), None);
        assert_eq!(redirect_target("/my/bookings/42", "", None), None);
    }

    #[test]
    fn test_unprefixed_path_redirects_with_query() {
        assert_eq!(
            redirect_target("/rooms", "page=2&limit=10", None),
            Some("/en/rooms?page=2&limit=10".to_string())
        );
        assert_eq!(
            redirect_target("/bookings", "", Some("my")),
            Some("/my/bookings".to_string())
        );
    }

    #[test]
    fn test_unknown_locale_falls_back_to_default() {
        assert_eq!(
            redirect_target("/fr/rooms", "", None),
            Some("/en/rooms".to_string())
        );
    }

    #[test]
    fn test_static_paths_pass_through() {
        assert_eq!(redirect_target("/favicon.ico", "", None), None);
        assert_eq!(redirect_target("/api/health", "", None), None);
    }

    #[test]
    fn test_login_redirect_keeps_original_path() {
        assert_eq!(
            login_redirect(Locale::En, "/en/bookings"),
            "/en/login?next=%2Fen%2Fbookings"
        );
    }
}
