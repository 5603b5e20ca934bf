//! Startup announcement templating

/// Values substituted into an announcement template
#[derive(Debug, Clone, Copy)]
pub struct AnnouncementValues<'a> {
    pub username: &'a str,
    pub current_team: &'a str,
    pub teams: &'a [String],
}

/// Fill in `{USERNAME}`, `{CURRENT_TEAM}` and `{TEAMS}`.
///
/// Substitution is a single left-to-right pass, so substituted values are
/// never expanded again. Unknown `{...}` tokens pass through unchanged.
pub fn build_announcement(template: &str, values: AnnouncementValues<'_>) -> String {
    let teams = values.teams.join(", ");
    let replacements = [
        ("{USERNAME}", values.username),
        ("{CURRENT_TEAM}", values.current_team),
        ("{TEAMS}", teams.as_str()),
    ];

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match replacements
            .iter()
            .find(|(token, _)| candidate.starts_with(*token))
        {
            Some((token, value)) => {
                out.push_str(value);
                rest = &candidate[token.len()..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(teams: &[String]) -> AnnouncementValues<'_> {
        AnnouncementValues {
            username: "u",
            current_team: "t1",
            teams,
        }
    }

    #[test]
    fn test_all_tokens() {
        let teams = vec!["t1".to_string(), "t2".to_string()];
        assert_eq!(
            build_announcement("all {USERNAME} {CURRENT_TEAM} {TEAMS}", values(&teams)),
            "all u t1 t1, t2"
        );
    }

    #[test]
    fn test_unknown_token_unchanged() {
        let teams = vec!["t1".to_string()];
        assert_eq!(build_announcement("hi {FOO}", values(&teams)), "hi {FOO}");
    }

    #[test]
    fn test_doubled_braces() {
        let teams = vec!["t1".to_string()];
        assert_eq!(build_announcement("{{USERNAME}}", values(&teams)), "{u}");
    }

    #[test]
    fn test_repeated_and_adjacent_tokens() {
        let teams: Vec<String> = vec![];
        assert_eq!(
            build_announcement("{USERNAME}{USERNAME} [{TEAMS}]", values(&teams)),
            "uu []"
        );
    }

    #[test]
    fn test_substituted_values_not_expanded() {
        let teams = vec!["{USERNAME}".to_string()];
        assert_eq!(build_announcement("{TEAMS}", values(&teams)), "{USERNAME}");
    }
}
