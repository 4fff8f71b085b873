/// Expand environment variables in a path string.
///
/// Supports `$VAR`, `${VAR}` and `~` for the home directory. Unresolvable
/// input is returned unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_unknown_variable_when_expanding_then_returns_input() {
        let input = "$RESTREE_SURELY_UNSET_VAR/file.toml";
        assert_eq!(expand_env_vars(input), input);
    }

    #[test]
    fn given_plain_path_when_expanding_then_unchanged() {
        assert_eq!(expand_env_vars("/var/lib/data.toml"), "/var/lib/data.toml");
    }
}
