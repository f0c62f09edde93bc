//! Clients that modules publish for each other, looked up by interface type.
//!
//! `vouchers` publishes `Arc<dyn VouchersApi>` during init; any later module (or test)
//! resolves it with `hub.get::<dyn VouchersApi>()`.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use parking_lot::RwLock;

#[derive(Debug, thiserror::Error)]
#[error("no client registered for {type_name}")]
pub struct ClientNotFound {
    pub type_name: &'static str,
}

#[derive(Default)]
pub struct ClientHub {
    clients: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ClientHub {
    /// Publishes `client` as `T`, replacing any earlier registration.
    pub fn register<T>(&self, client: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        tracing::debug!(client = type_name::<T>(), "client registered");
        self.clients.write().insert(TypeId::of::<T>(), Box::new(client));
    }

    pub fn get<T>(&self) -> Result<Arc<T>, ClientNotFound>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.clients
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or(ClientNotFound {
                type_name: type_name::<T>(),
            })
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.clients.read().contains_key(&TypeId::of::<T>())
    }
}
