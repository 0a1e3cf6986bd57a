use std::{
  collections::{hash_map::Entry, HashMap},
  fmt,
};

use docstore::{DynServer, DynStore};
use record::Schema;

use crate::CollectionConfig;

/// A registered collection and its open handles.
pub struct CollectionBinding {
  config: CollectionConfig,
  server: DynServer,
  store:  DynStore,
}

impl CollectionBinding {
  pub(crate) fn new(
    config: CollectionConfig,
    server: DynServer,
    store: DynStore,
  ) -> Self {
    Self {
      config,
      server,
      store,
    }
  }

  /// The collection name.
  pub fn identity(&self) -> &str { &self.config.identity }
  /// The backing database name.
  pub fn database(&self) -> &str { self.config.database_name() }
  /// The config the collection was registered with.
  pub fn config(&self) -> &CollectionConfig { &self.config }
  /// The logical schema.
  pub fn schema(&self) -> &Schema { &self.config.definition }
  /// The server handle.
  pub fn server(&self) -> &DynServer { &self.server }
  /// The database handle.
  pub fn store(&self) -> &DynStore { &self.store }
}

impl fmt::Debug for CollectionBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CollectionBinding")
      .field("identity", &self.identity())
      .field("database", &self.database())
      .field("server", &self.config.connection.server_url())
      .finish()
  }
}

/// Collection bindings by name. One binding per collection.
#[derive(Debug, Default)]
pub struct Registry {
  bindings: HashMap<String, CollectionBinding>,
}

impl Registry {
  /// Creates an empty registry.
  pub fn new() -> Self { Self::default() }

  /// Looks up a binding.
  pub fn get(&self, identity: &str) -> Option<&CollectionBinding> {
    self.bindings.get(identity)
  }

  /// Inserts a binding, replacing any previous one for the same collection.
  pub fn insert(&mut self, binding: CollectionBinding) -> &CollectionBinding {
    match self.bindings.entry(binding.identity().to_owned()) {
      Entry::Occupied(mut occupied) => {
        occupied.insert(binding);
        occupied.into_mut()
      }
      Entry::Vacant(vacant) => vacant.insert(binding),
    }
  }

  /// Number of registered collections.
  pub fn len(&self) -> usize { self.bindings.len() }

  /// Whether nothing is registered.
  pub fn is_empty(&self) -> bool { self.bindings.is_empty() }

  /// Removes every binding.
  pub fn clear(&mut self) { self.bindings.clear(); }
}
