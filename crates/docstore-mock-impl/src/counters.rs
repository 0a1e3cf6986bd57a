use std::sync::atomic::{AtomicUsize, Ordering};

/// How many times each store operation has been called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
  /// [`Connector::connect`](docstore::Connector::connect) calls.
  pub connect:          usize,
  /// `database_info` calls.
  pub database_info:    usize,
  /// `create_database` calls.
  pub create_database:  usize,
  /// `destroy_database` calls.
  pub destroy_database: usize,
  /// `authenticate` calls.
  pub authenticate:     usize,
  /// `session` calls.
  pub session:          usize,
  /// Document `get` calls.
  pub get:              usize,
  /// `list` calls.
  pub list:             usize,
  /// `insert` calls.
  pub insert:           usize,
  /// `put` calls.
  pub put:              usize,
  /// `delete` calls.
  pub delete:           usize,
  /// `query_view` calls.
  pub query_view:       usize,
  /// `save_view` calls.
  pub save_view:        usize,
}

#[derive(Default)]
pub(crate) struct Counters {
  pub(crate) connect:          AtomicUsize,
  pub(crate) database_info:    AtomicUsize,
  pub(crate) create_database:  AtomicUsize,
  pub(crate) destroy_database: AtomicUsize,
  pub(crate) authenticate:     AtomicUsize,
  pub(crate) session:          AtomicUsize,
  pub(crate) get:              AtomicUsize,
  pub(crate) list:             AtomicUsize,
  pub(crate) insert:           AtomicUsize,
  pub(crate) put:              AtomicUsize,
  pub(crate) delete:           AtomicUsize,
  pub(crate) query_view:       AtomicUsize,
  pub(crate) save_view:        AtomicUsize,
}

impl Counters {
  pub(crate) fn bump(&self, counter: impl FnOnce(&Self) -> &AtomicUsize) {
    counter(self).fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self) -> CallCounts {
    let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
    CallCounts {
      connect:          load(&self.connect),
      database_info:    load(&self.database_info),
      create_database:  load(&self.create_database),
      destroy_database: load(&self.destroy_database),
      authenticate:     load(&self.authenticate),
      session:          load(&self.session),
      get:              load(&self.get),
      list:             load(&self.list),
      insert:           load(&self.insert),
      put:              load(&self.put),
      delete:           load(&self.delete),
      query_view:       load(&self.query_view),
      save_view:        load(&self.save_view),
    }
  }
}
