use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use avrow_error::{AvrowResult, avrow_err};
use object_store::ObjectStore;
use url::{Position, Url};

/// Runtime services handed to a row codec by its host.
///
/// Holds the object stores backing distributed filesystem locations, keyed by the
/// `scheme://authority` prefix of the URLs they serve.
#[derive(Clone, Default)]
pub struct RuntimeContext {
    object_stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`RuntimeContext::register_object_store`].
    pub fn with_object_store(mut self, url: &Url, store: Arc<dyn ObjectStore>) -> Self {
        self.register_object_store(url, store);
        self
    }

    /// Serve every location sharing the scheme and authority of `url` from `store`.
    ///
    /// Returns the store previously registered for that prefix, if any.
    pub fn register_object_store(
        &mut self,
        url: &Url,
        store: Arc<dyn ObjectStore>,
    ) -> Option<Arc<dyn ObjectStore>> {
        self.object_stores.insert(store_key(url), store)
    }

    /// The store registered for the scheme and authority of `url`.
    pub fn object_store(&self, url: &Url) -> AvrowResult<Arc<dyn ObjectStore>> {
        let key = store_key(url);
        self.object_stores
            .get(&key)
            .cloned()
            .ok_or_else(|| avrow_err!(Configuration: "No object store registered for {key}"))
    }
}

impl Debug for RuntimeContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("object_stores", &self.object_stores.keys())
            .finish()
    }
}

fn store_key(url: &Url) -> String {
    format!(
        "{}://{}",
        url.scheme(),
        &url[Position::BeforeHost..Position::AfterPort]
    )
}
