use chrono::Duration;
use common_auth::{Claims, Role};
use common_security::{authorize, evaluate, PolicyError, Rule};
use proptest::prelude::*;
use uuid::Uuid;

fn uuid() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn claims() -> impl Strategy<Value = Claims> {
    (
        uuid(),
        prop::collection::vec(prop::sample::select(Role::ALL.to_vec()), 0..4),
    )
        .prop_map(|(subject, roles)| {
            Claims::issue(subject, roles, "issuer", Duration::hours(1)).expect("claims")
        })
}

proptest! {
    #[test]
    fn admin_only_allows_exactly_admins(claims in claims(), owner in prop::option::of(uuid())) {
        let allowed = authorize(&claims, owner, Rule::AdminOnly).is_ok();
        prop_assert_eq!(allowed, claims.has_role(Role::Admin));
    }

    #[test]
    fn user_only_allows_exactly_users(claims in claims()) {
        let allowed = authorize(&claims, None, Rule::UserOnly).is_ok();
        prop_assert_eq!(allowed, claims.has_role(Role::User));
    }

    #[test]
    fn any_allows_every_identity(claims in claims()) {
        prop_assert!(authorize(&claims, None, Rule::Any).is_ok());
    }

    #[test]
    fn admin_or_subject_matches_definition(
        claims in claims(),
        owner in prop::option::of(uuid()),
        owner_is_subject in any::<bool>(),
    ) {
        let owner = if owner_is_subject { Some(claims.subject) } else { owner };
        let expected = claims.has_role(Role::Admin) || owner == Some(claims.subject);

        match authorize(&claims, owner, Rule::AdminOrSubject) {
            Ok(()) => prop_assert!(expected),
            Err(err) => {
                prop_assert!(!expected);
                let message = err.to_string();
                prop_assert!(message.contains("rule[AdminOrSubject]"), "{}", message);
                let roles = format!("claims[{:?}]", claims.roles);
                prop_assert!(message.contains(&roles), "{}", message);
                prop_assert!(matches!(err, PolicyError::Denied(_)));
            }
        }
    }

    #[test]
    fn evaluation_is_deterministic(claims in claims(), owner in prop::option::of(uuid())) {
        for rule in Rule::ALL {
            prop_assert_eq!(evaluate(&claims, owner, rule), evaluate(&claims, owner, rule));
        }
    }
}
