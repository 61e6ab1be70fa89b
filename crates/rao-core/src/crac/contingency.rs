use crate::BranchKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyElement {
    /// Branch name in the network
    pub id: String,
    pub element_type: BranchKind,
}

/// Postulated simultaneous outage of one or more branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contingency {
    pub id: String,
    pub name: Option<String>,
    pub elements: Vec<ContingencyElement>,
}

impl Contingency {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            elements: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_element(mut self, id: impl Into<String>, element_type: BranchKind) -> Self {
        self.elements.push(ContingencyElement {
            id: id.into(),
            element_type,
        });
        self
    }

    /// Shorthand for a line outage.
    pub fn with_branch(self, id: impl Into<String>) -> Self {
        self.with_element(id, BranchKind::Line)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
