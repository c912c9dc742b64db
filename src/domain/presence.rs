use std::collections::BTreeSet;

use super::events::PeerActivity;

/// Users currently reported online by the live channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    online: BTreeSet<String>,
}

impl PresenceSet {
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.online.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    /// Applies a status event. Returns true if the set changed.
    pub fn apply(&mut self, activity: &PeerActivity) -> bool {
        match activity {
            PeerActivity::Status { user_id, online: true } => self.online.insert(user_id.clone()),
            PeerActivity::Status {
                user_id,
                online: false,
            } => self.online.remove(user_id),
            PeerActivity::Typing { .. } => false,
        }
    }

    /// Forgets every user, e.g. after the live channel dropped.
    pub fn clear(&mut self) {
        self.online.clear();
    }
}
