use serde::{Deserialize, Serialize};

/// Decision stage kind. Variant order is the causal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstantKind {
    Preventive,
    Outage,
    Auto,
    Curative,
}

impl InstantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstantKind::Preventive => "PREVENTIVE",
            InstantKind::Outage => "OUTAGE",
            InstantKind::Auto => "AUTO",
            InstantKind::Curative => "CURATIVE",
        }
    }
}

impl std::fmt::Display for InstantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision stage. `order` is the declaration position and totally orders
/// instants, including several curative ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instant {
    pub id: String,
    pub kind: InstantKind,
    pub order: usize,
}

impl Instant {
    pub fn is_preventive(&self) -> bool {
        self.kind == InstantKind::Preventive
    }

    pub fn is_outage(&self) -> bool {
        self.kind == InstantKind::Outage
    }

    pub fn is_auto(&self) -> bool {
        self.kind == InstantKind::Auto
    }

    pub fn is_curative(&self) -> bool {
        self.kind == InstantKind::Curative
    }

    pub fn comes_before(&self, other: &Instant) -> bool {
        self.order < other.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_causal_order() {
        assert!(InstantKind::Preventive < InstantKind::Outage);
        assert!(InstantKind::Outage < InstantKind::Auto);
        assert!(InstantKind::Auto < InstantKind::Curative);
        assert_eq!(InstantKind::Curative.to_string(), "CURATIVE");
    }

    #[test]
    fn declaration_order_decides_between_curatives() {
        let first = Instant {
            id: "curative-1".into(),
            kind: InstantKind::Curative,
            order: 2,
        };
        let second = Instant {
            id: "curative-2".into(),
            kind: InstantKind::Curative,
            order: 3,
        };
        assert!(first.comes_before(&second));
        assert!(!second.comes_before(&first));
    }
}
