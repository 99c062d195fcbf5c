use crate::error::OAuth2Error;
use crate::models::ApiDescriptor;

const GROUP_SCOPE_PREFIX: &str = "wicked:";

/// Splits a space-separated scope string into a normalized list (§3).
pub fn parse_scope(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn format_scope(scopes: &[String]) -> Option<String> {
    if scopes.is_empty() {
        None
    } else {
        Some(scopes.join(" "))
    }
}

/// Validates a requested scope list against the API's scope catalogue (§4.1
/// `ValidateScope`). A trusted subscription is granted the full catalogue regardless of
/// what it asked for; an untrusted subscription must name only recognized scopes.
/// Returns `(validated_scopes, scopes_differ)`.
pub fn validate(
    requested: &[String],
    api: &ApiDescriptor,
    trusted: bool,
) -> Result<(Vec<String>, bool), OAuth2Error> {
    if trusted {
        let scopes_differ = requested.is_empty() || requested != api.scopes;
        return Ok((api.scopes.clone(), scopes_differ));
    }

    for scope in requested {
        if !api.scopes.contains(scope) {
            return Err(OAuth2Error::InvalidScope(format!("unknown scope: {}", scope)));
        }
    }
    Ok((requested.to_vec(), false))
}

/// Synthesizes `wicked:<group>` scopes for each group the user belongs to and unions
/// them with the validated scope list (§4.1 "Scope merging").
pub fn merge_groups(validated: &[String], groups: &[String]) -> Vec<String> {
    let mut merged = validated.to_vec();
    for group in groups {
        let synthetic = format!("{}{}", GROUP_SCOPE_PREFIX, group);
        if !merged.contains(&synthetic) {
            merged.push(synthetic);
        }
    }
    merged
}

/// Strips synthetic `wicked:` scopes before re-resolving scope on refresh (§4.1).
pub fn strip_group_scopes(scopes: &[String]) -> Vec<String> {
    scopes
        .iter()
        .filter(|s| !s.starts_with(GROUP_SCOPE_PREFIX))
        .cloned()
        .collect()
}

/// Scopes from `desired` that are not already present in `granted` (§4.1 `ScopeConsent`).
pub fn missing_grants(desired: &[String], granted: &[String]) -> Vec<String> {
    desired.iter().filter(|s| !granted.contains(s)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(scopes: &[&str]) -> ApiDescriptor {
        ApiDescriptor {
            id: "api1".to_string(),
            auth_methods: vec![],
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            registration_pool: None,
            passthrough_users: false,
            passthrough_scope_url: None,
            disable_register: false,
        }
    }

    #[test]
    fn untrusted_unknown_scope_is_rejected() {
        let requested = vec!["read".to_string(), "bogus".to_string()];
        let result = validate(&requested, &api(&["read", "write"]), false);
        assert!(matches!(result, Err(OAuth2Error::InvalidScope(_))));
    }

    #[test]
    fn untrusted_known_scope_passes_through() {
        let requested = vec!["read".to_string()];
        let (validated, differs) = validate(&requested, &api(&["read", "write"]), false).unwrap();
        assert_eq!(validated, vec!["read".to_string()]);
        assert!(!differs);
    }

    #[test]
    fn trusted_subscription_gets_full_catalogue() {
        let requested = vec!["read".to_string()];
        let (validated, differs) = validate(&requested, &api(&["read", "write"]), true).unwrap();
        assert_eq!(validated, vec!["read".to_string(), "write".to_string()]);
        assert!(differs);
    }

    #[test]
    fn group_scopes_are_merged_and_deduped() {
        let merged = merge_groups(&["read".to_string()], &["admins".to_string(), "admins".to_string()]);
        assert_eq!(merged, vec!["read".to_string(), "wicked:admins".to_string()]);
    }

    #[test]
    fn group_scopes_are_stripped_before_refresh() {
        let scopes = vec!["read".to_string(), "wicked:admins".to_string()];
        assert_eq!(strip_group_scopes(&scopes), vec!["read".to_string()]);
    }
}
