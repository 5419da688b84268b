use std::fmt;
use std::str::FromStr;

use common_auth::{Claims, Role};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Named authorization policies, selected per endpoint by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Rule {
    /// Any authenticated identity.
    Any,
    UserOnly,
    AdminOnly,
    /// Admin role, or the subject owns the target resource.
    AdminOrSubject,
}

impl Rule {
    pub const ALL: [Rule; 4] = [Rule::Any, Rule::UserOnly, Rule::AdminOnly, Rule::AdminOrSubject];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Any => "Any",
            Rule::UserOnly => "UserOnly",
            Rule::AdminOnly => "AdminOnly",
            Rule::AdminOrSubject => "AdminOrSubject",
        }
    }

    /// Whether evaluation consults the resource-owner id.
    pub fn inspects_owner(&self) -> bool {
        matches!(self, Rule::AdminOrSubject)
    }

    // A rule passes when any of its checks holds.
    fn checks(&self, owner: Option<Uuid>) -> Vec<Check> {
        match self {
            Rule::Any => vec![Check::Authenticated],
            Rule::UserOnly => vec![Check::HasRole(Role::User)],
            Rule::AdminOnly => vec![Check::HasRole(Role::Admin)],
            Rule::AdminOrSubject => vec![Check::HasRole(Role::Admin), Check::SubjectIs(owner)],
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rule {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::ALL
            .into_iter()
            .find(|rule| rule.as_str() == s)
            .ok_or_else(|| PolicyError::UnknownRule(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Check {
    Authenticated,
    HasRole(Role),
    SubjectIs(Option<Uuid>),
}

impl Check {
    fn holds(&self, claims: &Claims) -> bool {
        match self {
            Check::Authenticated => true,
            Check::HasRole(role) => claims.has_role(*role),
            Check::SubjectIs(owner) => *owner == Some(claims.subject),
        }
    }

    fn describe(&self) -> String {
        match self {
            Check::Authenticated => "authenticated".to_string(),
            Check::HasRole(role) => format!("has_role({role})"),
            Check::SubjectIs(Some(owner)) => format!("subject_is({owner})"),
            Check::SubjectIs(None) => "subject_is(none)".to_string(),
        }
    }
}

/// Outcome of evaluating one rule against one claims set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub rule: Rule,
    pub allowed: bool,
    pub roles: Vec<Role>,
    /// Each check with its truth value, e.g. `has_role(ADMIN)=false || subject_is(..)=true => true`.
    pub trace: String,
}

impl Decision {
    pub fn into_result(self) -> Result<(), Denial> {
        if self.allowed {
            Ok(())
        } else {
            Err(Denial {
                rule: self.rule,
                roles: self.roles,
                trace: self.trace,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("you are not authorized for that action, claims[{roles:?}] rule[{rule}]: {trace}")]
pub struct Denial {
    pub rule: Rule,
    pub roles: Vec<Role>,
    pub trace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unknown rule '{0}'")]
    UnknownRule(String),
    #[error(transparent)]
    Denied(#[from] Denial),
}

/// Evaluates `rule`. Pure: no I/O, and identical inputs give identical traces.
///
/// `owner` is only read by rules that inspect ownership; pass `None` otherwise.
pub fn evaluate(claims: &Claims, owner: Option<Uuid>, rule: Rule) -> Decision {
    let mut allowed = false;
    let mut terms = Vec::new();
    for check in rule.checks(owner) {
        let holds = check.holds(claims);
        allowed |= holds;
        terms.push(format!("{}={holds}", check.describe()));
    }

    Decision {
        rule,
        allowed,
        roles: claims.roles.clone(),
        trace: format!("{} => {allowed}", terms.join(" || ")),
    }
}

pub fn authorize(claims: &Claims, owner: Option<Uuid>, rule: Rule) -> Result<(), PolicyError> {
    evaluate(claims, owner, rule)
        .into_result()
        .map_err(PolicyError::from)
}

/// Same as [`authorize`] for a rule given by name.
pub fn authorize_named(
    claims: &Claims,
    owner: Option<Uuid>,
    rule: &str,
) -> Result<(), PolicyError> {
    let rule = rule.parse::<Rule>()?;
    authorize(claims, owner, rule)
}
