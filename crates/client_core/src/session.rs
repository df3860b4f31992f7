use std::sync::{PoisonError, RwLock};

/// Read-only view of who is signed in. Consulted on every mutating call; never cached.
pub trait SessionAccessor: Send + Sync {
    fn current_actor(&self) -> Option<String>;
}

fn normalize_actor(actor: Option<String>) -> Option<String> {
    actor.filter(|name| !name.trim().is_empty())
}

/// Session fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    actor: Option<String>,
}

impl StaticSession {
    pub fn anonymous() -> Self {
        Self { actor: None }
    }

    pub fn authenticated(actor: impl Into<String>) -> Self {
        Self {
            actor: normalize_actor(Some(actor.into())),
        }
    }
}

impl SessionAccessor for StaticSession {
    fn current_actor(&self) -> Option<String> {
        self.actor.clone()
    }
}

/// Session that can be signed in and out while coordinators hold it.
#[derive(Debug, Default)]
pub struct SharedSession {
    actor: RwLock<Option<String>>,
}

impl SharedSession {
    pub fn new(actor: Option<String>) -> Self {
        Self {
            actor: RwLock::new(normalize_actor(actor)),
        }
    }

    pub fn login(&self, actor: impl Into<String>) {
        let mut guard = self.actor.write().unwrap_or_else(PoisonError::into_inner);
        *guard = normalize_actor(Some(actor.into()));
    }

    pub fn logout(&self) {
        let mut guard = self.actor.write().unwrap_or_else(PoisonError::into_inner);
        guard.take();
    }
}

impl SessionAccessor for SharedSession {
    fn current_actor(&self) -> Option<String> {
        self.actor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
