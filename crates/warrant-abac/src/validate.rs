//! Structural checks applied before a policy is stored.

use crate::error::{AccessError, Result};
use crate::key::KeyCodec;
use crate::policy::{Axis, Policy};
use crate::{location, notation, time};

/// Rejects a policy that cannot be indexed or evaluated.
pub fn validate(policy: &Policy, codec: &KeyCodec) -> Result<()> {
    let invalid = |reason: &str| AccessError::InvalidPolicy {
        reason: reason.to_string(),
    };

    for axis in Axis::ALL {
        if codec.parse(policy.value(axis)).is_err() {
            return Err(invalid("policy is not valid"));
        }
    }

    if !policy.location.iter().all(|l| location::is_ip_or_cidr(l)) {
        return Err(invalid("policy location is not valid"));
    }

    if !policy
        .time
        .iter()
        .all(|t| t.duration > 0 && time::validate_cron(&t.cron_exp))
    {
        return Err(invalid("policy time is not valid"));
    }

    if !policy
        .field
        .iter()
        .chain(&policy.filter)
        .all(|glob| notation::is_valid(glob))
    {
        return Err(invalid("policy notation is not valid"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeWindow;

    fn policy() -> Policy {
        Policy::new("vhid.vz@gmail.com:author", "read:shared", "articles:published")
            .with_time(TimeWindow::new("* * 7 * * *", 9 * 60 * 60))
            .with_location(["192.168.2.10", "192.168.1.0/24"])
    }

    fn reason(policy: &Policy) -> String {
        match validate(policy, &KeyCodec::new()) {
            Err(AccessError::InvalidPolicy { reason }) => reason,
            other => panic!("expected InvalidPolicy, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_policy() {
        assert!(validate(&policy(), &KeyCodec::new()).is_ok());
    }

    #[test]
    fn test_empty_identifiers() {
        let mut empty_action = policy();
        empty_action.action = String::new();
        assert_eq!(reason(&empty_action), "policy is not valid");

        let mut bad_scope = policy();
        bad_scope.object = "articles:".to_string();
        assert_eq!(reason(&bad_scope), "policy is not valid");
    }

    #[test]
    fn test_time_rules() {
        let mut five_fields = policy();
        five_fields.time = vec![TimeWindow::new("* * * * *", 28_800)];
        assert_eq!(reason(&five_fields), "policy time is not valid");

        let mut zero_duration = policy();
        zero_duration.time = vec![TimeWindow::new("0 0 7 * * *", 0)];
        assert_eq!(reason(&zero_duration), "policy time is not valid");
    }

    #[test]
    fn test_location_rules() {
        let mut bad = policy();
        bad.location = vec!["192.168.1.".to_string(), "::::".to_string()];
        assert_eq!(reason(&bad), "policy location is not valid");

        let mut ipv6 = policy();
        ipv6.location = vec!["fe80::1e15:1fff:fecc:d300/36".to_string()];
        assert!(validate(&ipv6, &KeyCodec::new()).is_ok());
    }

    #[test]
    fn test_notation_rules() {
        let bad = policy().with_filter(["*", "items[x]"]);
        assert_eq!(reason(&bad), "policy notation is not valid");
    }

    #[test]
    fn test_separator_aware() {
        let codec = KeyCodec::new().with_separator("#").unwrap();
        let policy = Policy::new("user", "read#own", "article#published");
        assert!(validate(&policy, &codec).is_ok());
        assert!(validate(&policy, &KeyCodec::new()).is_ok());

        let nested = Policy::new("user", "read#own#extra", "article");
        assert!(validate(&nested, &codec).is_err());
    }
}
