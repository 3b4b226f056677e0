//! `{key}` placeholder rendering for notes and follow-ups.

use std::collections::HashMap;

use crate::timing::Pacer;

/// Replace every `{key}` whose key is in `values`. Unknown keys stay
/// literal. Substituted text is never rescanned.
pub fn render<V: AsRef<str>>(template: &str, values: &HashMap<&str, V>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after
            .find('}')
            .and_then(|close| values.get(&after[..close]).map(|v| (close, v)));
        match hit {
            Some((close, value)) => {
                out.push_str(value.as_ref());
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Values for `{name}`, `{first_name}` and `{company}`.
pub fn substitutions<'a>(name: &'a str, company: &'a str) -> HashMap<&'static str, &'a str> {
    let name = name.trim();
    let first_name = name.split_whitespace().next().unwrap_or("");
    HashMap::from([
        ("name", name),
        ("first_name", first_name),
        ("company", company.trim()),
    ])
}

/// Pick a random non-blank template.
pub fn choose_template<'a>(pacer: &Pacer, templates: &'a [String]) -> Option<&'a str> {
    let usable: Vec<&str> = templates
        .iter()
        .map(String::as_str)
        .filter(|t| !t.trim().is_empty())
        .collect();
    pacer.choose(&usable).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_render_basic() {
        let values = HashMap::from([("name", "A"), ("company", "B")]);
        assert_eq!(render("hello {name}, from {company}", &values), "hello A, from B");
    }

    #[test]
    fn test_render_leaves_unknown_keys() {
        let values = HashMap::from([("name", "A")]);
        assert_eq!(render("{greeting} {name}!", &values), "{greeting} A!");
        assert_eq!(render("open { brace", &values), "open { brace");
        assert_eq!(render("{{name}}", &values), "{A}");
        assert_eq!(render("{name}{name}", &values), "AA");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let values = HashMap::from([("name", "{company}"), ("company", "Acme")]);
        assert_eq!(render("{name} @ {company}", &values), "{company} @ Acme");
    }

    #[test]
    fn test_substitutions_first_name() {
        let subs = substitutions("  Ada King Lovelace ", "Engines ");
        assert_eq!(subs["name"], "Ada King Lovelace");
        assert_eq!(subs["first_name"], "Ada");
        assert_eq!(subs["company"], "Engines");
        assert_eq!(render("Hi {first_name}", &substitutions("", "")), "Hi ");
    }

    #[test]
    fn test_choose_template_skips_blank() {
        let pacer = Pacer::seeded(1, CancellationToken::new());
        assert!(choose_template(&pacer, &[]).is_none());
        assert!(choose_template(&pacer, &["  ".to_string()]).is_none());
        let pool = vec!["".to_string(), "Hi {name}".to_string()];
        for _ in 0..10 {
            assert_eq!(choose_template(&pacer, &pool), Some("Hi {name}"));
        }
    }
}
