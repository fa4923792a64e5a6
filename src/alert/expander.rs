//! Message template expansion.

/// Replaces placeholders in a message template.
pub trait TextExpander: Send + Sync {
    /// Expands `template`, asking `resolver` for the value of each key.
    /// Keys the resolver does not know are left as written.
    fn expand(&self, template: &str, resolver: &dyn Fn(&str) -> Option<String>) -> String;
}

/// `${key}` placeholder syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceExpander;

impl TextExpander for BraceExpander {
    fn expand(&self, template: &str, resolver: &dyn Fn(&str) -> Option<String>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // Unterminated placeholder.
                out.push_str(&rest[start..]);
                return out;
            };
            let key = &after[..end];
            match resolver(key.trim()) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..start + 2 + end + 1]),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(key: &str) -> Option<String> {
        match key {
            "username" => Some("alice".to_string()),
            "event" => Some("logon".to_string()),
            _ => None,
        }
    }

    #[test]
    fn replaces_known_keys() {
        assert_eq!(
            BraceExpander.expand("${username} did ${event}", &resolve),
            "alice did logon"
        );
    }

    #[test]
    fn unknown_keys_are_left_verbatim() {
        assert_eq!(
            BraceExpander.expand("host ${hostname} for ${username}", &resolve),
            "host ${hostname} for alice"
        );
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        assert_eq!(
            BraceExpander.expand("${username} and ${event", &resolve),
            "alice and ${event"
        );
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        assert_eq!(BraceExpander.expand("plain $ text {}", &resolve), "plain $ text {}");
        assert_eq!(BraceExpander.expand("", &resolve), "");
    }

    #[test]
    fn adjacent_placeholders() {
        assert_eq!(
            BraceExpander.expand("${username}${event}", &resolve),
            "alicelogon"
        );
    }
}
