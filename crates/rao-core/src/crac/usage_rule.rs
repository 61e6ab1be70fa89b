use serde::{Deserialize, Serialize};

/// How a granted remedial action is used. `Forced` outranks `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageMethod {
    /// Candidate for the search
    Available,
    /// Applied unconditionally at the instant, before the search
    Forced,
}

/// Predicate granting a remedial action at an instant, optionally only after
/// one contingency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsageRule {
    OnInstant {
        instant_id: String,
        usage_method: UsageMethod,
    },
    OnContingencyState {
        instant_id: String,
        contingency_id: String,
        usage_method: UsageMethod,
    },
}

impl UsageRule {
    pub fn on_instant(instant_id: impl Into<String>, usage_method: UsageMethod) -> Self {
        UsageRule::OnInstant {
            instant_id: instant_id.into(),
            usage_method,
        }
    }

    pub fn on_contingency_state(
        instant_id: impl Into<String>,
        contingency_id: impl Into<String>,
        usage_method: UsageMethod,
    ) -> Self {
        UsageRule::OnContingencyState {
            instant_id: instant_id.into(),
            contingency_id: contingency_id.into(),
            usage_method,
        }
    }

    pub fn instant_id(&self) -> &str {
        match self {
            UsageRule::OnInstant { instant_id, .. }
            | UsageRule::OnContingencyState { instant_id, .. } => instant_id,
        }
    }

    pub fn contingency_id(&self) -> Option<&str> {
        match self {
            UsageRule::OnInstant { .. } => None,
            UsageRule::OnContingencyState { contingency_id, .. } => Some(contingency_id),
        }
    }

    pub fn usage_method(&self) -> UsageMethod {
        match self {
            UsageRule::OnInstant { usage_method, .. }
            | UsageRule::OnContingencyState { usage_method, .. } => *usage_method,
        }
    }

    /// Whether the rule grants the action in the (instant, contingency) state.
    /// An on-instant rule covers every contingency at its instant.
    pub fn grants(&self, instant_id: &str, contingency_id: Option<&str>) -> bool {
        match self {
            UsageRule::OnInstant { instant_id: id, .. } => id == instant_id,
            UsageRule::OnContingencyState {
                instant_id: id,
                contingency_id: co,
                ..
            } => id == instant_id && contingency_id == Some(co.as_str()),
        }
    }
}

/// Strongest usage method granted by `rules` in the given state.
pub fn usage_method_at(
    rules: &[UsageRule],
    instant_id: &str,
    contingency_id: Option<&str>,
) -> Option<UsageMethod> {
    rules
        .iter()
        .filter(|r| r.grants(instant_id, contingency_id))
        .map(UsageRule::usage_method)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_instant_covers_all_contingencies() {
        let rule = UsageRule::on_instant("curative", UsageMethod::Available);
        assert!(rule.grants("curative", Some("co-a")));
        assert!(rule.grants("curative", Some("co-b")));
        assert!(!rule.grants("preventive", None));
    }

    #[test]
    fn on_contingency_state_is_specific() {
        let rule = UsageRule::on_contingency_state("curative", "co-a", UsageMethod::Available);
        assert!(rule.grants("curative", Some("co-a")));
        assert!(!rule.grants("curative", Some("co-b")));
        assert!(!rule.grants("curative", None));
    }

    #[test]
    fn forced_wins_over_available() {
        let rules = vec![
            UsageRule::on_instant("curative", UsageMethod::Available),
            UsageRule::on_contingency_state("curative", "co-a", UsageMethod::Forced),
        ];
        assert_eq!(
            usage_method_at(&rules, "curative", Some("co-a")),
            Some(UsageMethod::Forced)
        );
        assert_eq!(
            usage_method_at(&rules, "curative", Some("co-b")),
            Some(UsageMethod::Available)
        );
        assert_eq!(usage_method_at(&rules, "outage", Some("co-a")), None);
    }
}
