//! Operator-curated callsign registry.

use crate::store::DocumentStore;
use std::collections::HashMap;
use std::sync::Mutex;

const DOCUMENT: &str = "aliases.json";

/// Maps user ids to display callsigns.
///
/// Callsigns are set only by the operator and never expire. They label both
/// memory turns and prompt text so the model sees a stable name for each
/// regular, whatever their platform display name happens to be.
pub struct AliasStore {
    aliases: Mutex<HashMap<String, String>>,
    store: DocumentStore,
}

impl AliasStore {
    /// Load the alias document from disk.
    pub fn load(store: DocumentStore) -> Self {
        let aliases: HashMap<String, String> = store.load(DOCUMENT);
        Self {
            aliases: Mutex::new(aliases),
            store,
        }
    }

    /// Set or replace a user's callsign and persist the registry.
    pub fn set(&self, user_id: &str, callsign: &str) {
        let mut aliases = self.aliases.lock().expect("alias lock poisoned");
        aliases.insert(user_id.to_string(), callsign.to_string());
        if let Err(error) = self.store.save(DOCUMENT, &*aliases) {
            tracing::warn!(%error, user_id, "failed to persist aliases");
        }
    }

    /// The callsign for a user, if one has been assigned.
    pub fn get(&self, user_id: &str) -> Option<String> {
        self.aliases
            .lock()
            .expect("alias lock poisoned")
            .get(user_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::AliasStore;
    use crate::store::DocumentStore;

    #[test]
    fn set_and_get_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs = DocumentStore::open(dir.path()).expect("open store");
        let aliases = AliasStore::load(docs.clone());

        aliases.set("42", "Ghost");
        assert_eq!(aliases.get("42").as_deref(), Some("Ghost"));
        assert_eq!(aliases.get("99"), None);

        // Overwrite sticks, and the registry survives a reload.
        aliases.set("42", "Maverick");
        let reloaded = AliasStore::load(docs);
        assert_eq!(reloaded.get("42").as_deref(), Some("Maverick"));
    }
}
