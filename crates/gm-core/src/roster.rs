//! Actor roster: who plays which position, and who acts after the primary role.

use crate::document::{Player, PlayerKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Position id, e.g. "ceo".
    pub position: String,
    /// Short label used in narration and stream headers, e.g. "CTO".
    pub label: String,
    pub player_id: String,
    /// Display name for the players list.
    pub name: String,
    pub kind: PlayerKind,
    /// What this role cares about; fed to its decision prompt.
    #[serde(default)]
    pub focus: String,
}

impl Role {
    pub fn human(position: &str, label: &str, player_id: &str, name: &str) -> Self {
        Self {
            position: position.to_string(),
            label: label.to_string(),
            player_id: player_id.to_string(),
            name: name.to_string(),
            kind: PlayerKind::Human,
            focus: String::new(),
        }
    }

    pub fn ai(position: &str, label: &str, focus: &str) -> Self {
        Self {
            position: position.to_string(),
            label: label.to_string(),
            player_id: format!("player_ai_{position}"),
            name: format!("{label} (AI)"),
            kind: PlayerKind::Ai,
            focus: focus.to_string(),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == PlayerKind::Ai
    }

    pub fn as_player(&self) -> Player {
        Player {
            id: self.player_id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            position: self.position.clone(),
        }
    }
}

/// Ordered set of roles. Declaration order is turn order for subordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Position whose turns trigger the AI subordinates.
    pub primary: String,
    pub roles: Vec<Role>,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            primary: "ceo".to_string(),
            roles: vec![
                Role::human("ceo", "CEO", "player_human", "CEO (player)"),
                Role::ai(
                    "cto",
                    "CTO",
                    "technology and product: R&D investment, engineering capacity, innovation",
                ),
                Role::ai(
                    "cmo",
                    "CMO",
                    "market and brand: pricing, campaigns, partnerships, reputation",
                ),
            ],
        }
    }
}

impl Roster {
    pub fn role(&self, position: &str) -> Option<&Role> {
        self.roles
            .iter()
            .find(|r| r.position.eq_ignore_ascii_case(position))
    }

    pub fn is_primary(&self, position: &str) -> bool {
        self.primary.eq_ignore_ascii_case(position)
    }

    /// AI roles that act after the primary role, in declaration order.
    pub fn subordinates(&self) -> Vec<&Role> {
        self.roles
            .iter()
            .filter(|r| r.is_ai() && !self.is_primary(&r.position))
            .collect()
    }

    /// Role for a position, or an ad-hoc human role for positions the roster
    /// does not know.
    pub fn resolve(&self, position: &str, player_id: &str) -> Role {
        match self.role(position) {
            Some(role) => Role {
                player_id: player_id.to_string(),
                ..role.clone()
            },
            None => {
                let label = position.to_uppercase();
                Role::human(position, &label, player_id, &label)
            }
        }
    }

    pub fn players(&self) -> Vec<Player> {
        self.roles.iter().map(Role::as_player).collect()
    }
}
