use docstore::{DocumentServer, ViewDefinition};
use docstore_mock_impl::{MockConnector, MockServer};
use serde_json::json;
use views::DESIGN_DOCUMENT;

use crate::{Adapter, CollectionConfig, Record, Schema};

const USERS: &str = "users";

fn users_config() -> CollectionConfig {
  CollectionConfig::new(USERS).with_definition(
    Schema::new()
      .with_attribute("name", json!({ "type": "string" }))
      .with_attribute("email", json!({ "type": "string" })),
  )
}

fn user(name: &str, email: &str) -> Record {
  Record::new().with("name", name).with("email", email)
}

struct Fixture {
  adapter: Adapter,
  server:  MockServer,
}

trait AdapterInstantiator {
  async fn init() -> Fixture;
}

async fn registered(server: MockServer) -> Fixture {
  let mut adapter = Adapter::new(MockConnector::new(server.clone()));
  adapter.register_collection(users_config()).await.unwrap();
  Fixture { adapter, server }
}

/// Starts from an empty server.
struct FreshInstantiator;

impl AdapterInstantiator for FreshInstantiator {
  async fn init() -> Fixture { registered(MockServer::new()).await }
}

/// Starts from a server whose database already holds an unrelated view.
struct ProvisionedInstantiator;

impl AdapterInstantiator for ProvisionedInstantiator {
  async fn init() -> Fixture {
    let server = MockServer::new();
    server.create_database(USERS).await.unwrap();
    server
      .database(USERS)
      .save_view(DESIGN_DOCUMENT, &ViewDefinition::for_fields(["nickname"]))
      .await
      .unwrap();
    registered(server).await
  }
}

#[generic_tests::define(attrs(tokio::test))]
mod generic_testing {
  use serde_json::json;

  use super::{user, users_config, AdapterInstantiator, USERS};
  use crate::{
    tests::{FreshInstantiator, ProvisionedInstantiator},
    AdapterError, DocId, Query, Record, UnsupportedQuery,
  };

  #[tokio::test]
  async fn test_create_returns_id_and_rev<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let created = fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com"))
      .await
      .unwrap();

    assert!(created.id().is_some());
    assert!(created.rev().is_some());
    assert_eq!(created.get("name"), Some(&json!("ada")));
    assert!(created.get("_id").is_none());
  }

  #[tokio::test]
  async fn test_find_by_id<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let created = fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com").with("id", "ada"))
      .await
      .unwrap();
    assert_eq!(created.id(), Some(DocId::from("ada")));

    let found = fixture
      .adapter
      .find(USERS, &Query::by_id("ada"))
      .await
      .unwrap();
    assert_eq!(found, vec![created]);
  }

  #[tokio::test]
  async fn test_find_by_missing_id_is_empty<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let found = fixture
      .adapter
      .find(USERS, &Query::by_id("nobody"))
      .await
      .unwrap();
    assert!(found.is_empty());
  }

  #[tokio::test]
  async fn test_find_by_id_list<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    for id in ["a", "b"] {
      fixture
        .adapter
        .create(USERS, Record::new().with("id", id))
        .await
        .unwrap();
    }

    let found = fixture
      .adapter
      .find(USERS, &Query::by_id(json!(["a", "missing", "b"])))
      .await
      .unwrap();
    let ids = found.iter().filter_map(Record::id).collect::<Vec<_>>();
    assert_eq!(ids, vec![DocId::from("a"), DocId::from("b")]);
  }

  #[tokio::test]
  async fn test_find_all_hides_design_documents<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    for name in ["a", "b", "c"] {
      fixture
        .adapter
        .create(USERS, user(name, &format!("{name}@example.com")))
        .await
        .unwrap();
    }
    // provisions the view, which adds a design document
    fixture
      .adapter
      .find(USERS, &Query::by_field("email", "a@example.com"))
      .await
      .unwrap();

    let all = fixture.adapter.find(USERS, &Query::all()).await.unwrap();
    assert_eq!(all.len(), 3);
    for record in &all {
      assert!(record.id().is_some());
      assert!(record.rev().is_some());
      assert!(record.get("_id").is_none());
      assert!(record.get("_rev").is_none());
      assert!(!record.id().unwrap().as_str().starts_with("_design/"));
    }
  }

  #[tokio::test]
  async fn test_find_all_paginates<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    // upper-case ids sort before `_design/` documents
    for id in ["A", "B", "C", "D"] {
      fixture
        .adapter
        .create(USERS, Record::new().with("id", id))
        .await
        .unwrap();
    }

    let page = fixture
      .adapter
      .find(USERS, &Query::all().skip(1).limit(2))
      .await
      .unwrap();
    let ids = page.iter().filter_map(Record::id).collect::<Vec<_>>();
    assert_eq!(ids, vec![DocId::from("B"), DocId::from("C")]);
  }

  #[tokio::test]
  async fn test_find_all_limit_skips_design_documents<
    I: AdapterInstantiator,
  >() {
    let fixture = I::init().await;

    for id in ["a", "b", "c"] {
      fixture
        .adapter
        .create(USERS, Record::new().with("id", id).with("n", id))
        .await
        .unwrap();
    }
    // `_design/views` now sorts ahead of every record
    fixture
      .adapter
      .find(USERS, &Query::by_field("n", "a"))
      .await
      .unwrap();

    let page = fixture
      .adapter
      .find(USERS, &Query::all().limit(2))
      .await
      .unwrap();
    let ids = page.iter().filter_map(Record::id).collect::<Vec<_>>();
    assert_eq!(ids, vec![DocId::from("a"), DocId::from("b")]);

    let all = fixture
      .adapter
      .find(USERS, &Query::all().limit(10))
      .await
      .unwrap();
    assert_eq!(all.len(), 3);
  }

  #[tokio::test]
  async fn test_find_by_field_creates_view_once<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let ada = fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com"))
      .await
      .unwrap();
    fixture
      .adapter
      .create(USERS, user("bob", "bob@example.com"))
      .await
      .unwrap();

    let before = fixture.server.call_counts();
    let found = fixture
      .adapter
      .find(USERS, &Query::by_field("email", "ada@example.com"))
      .await
      .unwrap();
    assert_eq!(found, vec![ada.clone()]);
    let after_first = fixture.server.call_counts();
    assert_eq!(after_first.save_view - before.save_view, 1);
    assert_eq!(after_first.query_view - before.query_view, 2);

    let found = fixture
      .adapter
      .find(USERS, &Query::by_field("email", "ada@example.com"))
      .await
      .unwrap();
    assert_eq!(found, vec![ada]);
    let after_second = fixture.server.call_counts();
    assert_eq!(after_second.save_view, after_first.save_view);
    assert_eq!(after_second.query_view - after_first.query_view, 1);
  }

  #[tokio::test]
  async fn test_find_by_field_matches_any_listed_value<
    I: AdapterInstantiator,
  >() {
    let fixture = I::init().await;

    for (name, email) in [("a", "a@x"), ("b", "b@x"), ("c", "c@x")] {
      fixture.adapter.create(USERS, user(name, email)).await.unwrap();
    }

    let found = fixture
      .adapter
      .find(USERS, &Query::by_field("email", json!(["c@x", "a@x"])))
      .await
      .unwrap();
    let names = found
      .iter()
      .filter_map(|r| r.get("name").and_then(|n| n.as_str()))
      .collect::<Vec<_>>();
    assert_eq!(names, vec!["c", "a"]);
  }

  #[tokio::test]
  async fn test_find_by_rev<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let created = fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com"))
      .await
      .unwrap();

    let found = fixture
      .adapter
      .find(USERS, &Query::by_field("rev", created.rev().unwrap()))
      .await
      .unwrap();
    assert_eq!(found, vec![created]);
  }

  #[tokio::test]
  async fn test_compound_predicate_is_rejected<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let result = fixture
      .adapter
      .find(USERS, &Query::by_field("name", "ada").and("email", "a@x"))
      .await;
    assert!(matches!(
      result,
      Err(AdapterError::UnsupportedQuery(
        UnsupportedQuery::CompoundPredicate { .. }
      ))
    ));
  }

  #[tokio::test]
  async fn test_update_with_current_rev<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let created = fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com").with("id", "ada"))
      .await
      .unwrap();

    let updated = fixture
      .adapter
      .update(
        USERS,
        &Query::by_id("ada"),
        created.clone().with("name", "ada lovelace"),
      )
      .await
      .unwrap();
    assert_eq!(updated.id(), Some(DocId::from("ada")));
    assert_ne!(updated.rev(), created.rev());
    assert_eq!(updated.get("name"), Some(&json!("ada lovelace")));

    let found = fixture
      .adapter
      .find(USERS, &Query::by_id("ada"))
      .await
      .unwrap();
    assert_eq!(found, vec![updated]);
  }

  #[tokio::test]
  async fn test_update_with_stale_rev_conflicts<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let created = fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com").with("id", "ada"))
      .await
      .unwrap();
    fixture
      .adapter
      .update(USERS, &Query::by_id("ada"), created.clone().with("name", "x"))
      .await
      .unwrap();

    let error = fixture
      .adapter
      .update(USERS, &Query::by_id("ada"), created.with("name", "y"))
      .await
      .unwrap_err();
    assert!(matches!(error, AdapterError::Conflict { .. }));
    assert!(error.is_retryable());
  }

  #[tokio::test]
  async fn test_update_without_id_touches_nothing<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let before = fixture.server.call_counts();
    for query in [
      Query::all(),
      Query::by_field("name", "ada"),
      Query::by_id(json!(["a", "b"])),
    ] {
      let error = fixture
        .adapter
        .update(USERS, &query, user("ada", "ada@example.com"))
        .await
        .unwrap_err();
      assert!(matches!(
        error,
        AdapterError::UnsupportedQuery(UnsupportedQuery::UpdateRequiresId)
      ));
      assert!(!error.is_retryable());
    }
    assert_eq!(fixture.server.call_counts(), before);
  }

  #[tokio::test]
  async fn test_merge_is_deep<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    fixture
      .adapter
      .create(
        USERS,
        Record::new()
          .with("id", "m")
          .with("profile", json!({ "a": 1, "b": 2 }))
          .with("tags", json!([1])),
      )
      .await
      .unwrap();

    let merged = fixture
      .adapter
      .merge(
        USERS,
        "m",
        Record::new()
          .with("profile", json!({ "b": 3, "c": 4 }))
          .with("tags", json!([2]))
          .with("rev", "1-bogus"),
      )
      .await
      .unwrap();

    assert_eq!(merged.get("profile"), Some(&json!({ "a": 1, "b": 3, "c": 4 })));
    assert_eq!(merged.get("tags"), Some(&json!([2])));
    assert_eq!(merged.id(), Some(DocId::from("m")));
    assert!(merged.rev().is_some_and(|rev| rev.starts_with("2-")));

    let found = fixture
      .adapter
      .find(USERS, &Query::by_id("m"))
      .await
      .unwrap();
    assert_eq!(found, vec![merged]);
  }

  #[tokio::test]
  async fn test_merge_into_missing_record<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let first = fixture
      .adapter
      .merge(USERS, "new", Record::new().with("a", json!({ "x": 1 })))
      .await
      .unwrap();
    assert_eq!(first.get("a"), Some(&json!({ "x": 1 })));
    assert_eq!(first.id(), Some(DocId::from("new")));
    assert!(first.rev().is_some());

    let second = fixture
      .adapter
      .merge(USERS, "new", Record::new().with("a", json!({ "y": 2 })))
      .await
      .unwrap();
    assert_eq!(second.get("a"), Some(&json!({ "x": 1, "y": 2 })));
    assert_ne!(second.rev(), first.rev());
  }

  #[tokio::test]
  async fn test_destroy_by_id<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    fixture
      .adapter
      .create(USERS, user("ada", "ada@example.com").with("id", "ada"))
      .await
      .unwrap();

    let live = fixture.server.document_count(USERS).await;
    let deleted = fixture
      .adapter
      .destroy(USERS, &Query::by_id("ada"))
      .await
      .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(fixture.server.document_count(USERS).await, live - 1);
    assert_eq!(deleted[0].get("name"), Some(&json!("ada")));

    let found = fixture
      .adapter
      .find(USERS, &Query::by_id("ada"))
      .await
      .unwrap();
    assert!(found.is_empty());

    let again = fixture
      .adapter
      .destroy(USERS, &Query::by_id("ada"))
      .await
      .unwrap();
    assert!(again.is_empty());
  }

  #[tokio::test]
  async fn test_destroy_by_field<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    for (name, email) in [("a", "same@x"), ("b", "same@x"), ("c", "other@x")] {
      fixture.adapter.create(USERS, user(name, email)).await.unwrap();
    }

    let deleted = fixture
      .adapter
      .destroy(USERS, &Query::by_field("email", "same@x"))
      .await
      .unwrap();
    assert_eq!(deleted.len(), 2);

    let rest = fixture.adapter.find(USERS, &Query::all()).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].get("name"), Some(&json!("c")));
  }

  #[tokio::test]
  async fn test_register_twice_is_a_no_op<I: AdapterInstantiator>() {
    let mut fixture = I::init().await;

    let before = fixture.server.call_counts();
    fixture
      .adapter
      .register_collection(users_config())
      .await
      .unwrap();
    assert_eq!(fixture.server.call_counts(), before);
    assert_eq!(fixture.adapter.registry().len(), 1);
  }

  #[tokio::test]
  async fn test_describe_returns_schema<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    let schema = fixture.adapter.describe(USERS).unwrap();
    assert_eq!(
      schema.attribute("email"),
      Some(&json!({ "type": "string" }))
    );
    assert!(matches!(
      fixture.adapter.describe("unknown"),
      Err(AdapterError::UnknownCollection(_))
    ));
  }

  #[tokio::test]
  async fn test_drop_keeps_binding<I: AdapterInstantiator>() {
    let fixture = I::init().await;

    fixture.adapter.drop_collection(USERS).await.unwrap();
    assert!(!fixture.server.has_database(USERS).await);
    assert!(fixture.adapter.describe(USERS).is_ok());

    let result = fixture.adapter.find(USERS, &Query::all()).await;
    assert!(matches!(result, Err(AdapterError::NotFound { .. })));
  }

  #[instantiate_tests(<FreshInstantiator>)]
  mod test_adapter_fresh {}

  #[instantiate_tests(<ProvisionedInstantiator>)]
  mod test_adapter_provisioned {}
}

#[tokio::test]
async fn unknown_collection_is_rejected() {
  let adapter = Adapter::new(MockConnector::default());

  let result = adapter.find(USERS, &crate::Query::all()).await;
  assert!(matches!(
    result,
    Err(crate::AdapterError::UnknownCollection(name)) if name == USERS
  ));
}

#[tokio::test]
async fn registration_creates_missing_database_only() {
  let server = MockServer::new();
  let mut adapter = Adapter::new(MockConnector::new(server.clone()));

  let binding = adapter.register_collection(users_config()).await.unwrap();
  assert_eq!(binding.database(), USERS);
  assert!(server.has_database(USERS).await);
  assert_eq!(server.call_counts().create_database, 1);

  // a second adapter finds the database already there
  let mut other = Adapter::new(MockConnector::new(server.clone()));
  other
    .register_collection(users_config().with_database(USERS))
    .await
    .unwrap();
  assert_eq!(server.call_counts().create_database, 1);
}

#[tokio::test]
async fn changed_config_rebinds() {
  let server = MockServer::new();
  let mut adapter = Adapter::new(MockConnector::new(server.clone()));

  adapter.register_collection(users_config()).await.unwrap();
  adapter
    .register_collection(users_config().with_database("people"))
    .await
    .unwrap();

  assert_eq!(adapter.registry().len(), 1);
  assert!(server.has_database("people").await);
  let binding = adapter.registry().get(USERS).unwrap();
  assert_eq!(binding.database(), "people");
}

#[tokio::test]
async fn lost_view_is_reported_after_one_attempt() {
  let server = MockServer::new();
  server.ignore_view_saves(true).await;
  let mut adapter = Adapter::new(MockConnector::new(server.clone()));
  adapter.register_collection(users_config()).await.unwrap();

  let result = adapter
    .find(USERS, &crate::Query::by_field("email", "a@x"))
    .await;
  assert!(matches!(
    result,
    Err(crate::AdapterError::IndexUnavailable { ref view })
      if view == "by_email"
  ));
  let counts = server.call_counts();
  assert_eq!(counts.save_view, 1);
  assert_eq!(counts.query_view, 2);
}

#[tokio::test]
async fn authenticate_then_session() {
  let server = MockServer::new();
  server.add_user("ada", "secret", &["admin"]).await;
  let mut adapter = Adapter::new(MockConnector::new(server));
  adapter.register_collection(users_config()).await.unwrap();

  let auth = adapter.authenticate(USERS, "ada", "secret").await.unwrap();
  assert_eq!(auth.username, "ada");
  assert_eq!(auth.roles, vec!["admin".to_owned()]);
  let token = auth.token.unwrap();

  let session = adapter.session(USERS, &token).await.unwrap();
  assert_eq!(session.name.as_deref(), Some("ada"));
  assert_eq!(session.roles, vec!["admin".to_owned()]);

  let anonymous = adapter.session(USERS, "not-a-token").await.unwrap();
  assert_eq!(anonymous.name, None);
}

#[tokio::test]
async fn wrong_password_is_not_retryable() {
  let server = MockServer::new();
  server.add_user("ada", "secret", &[]).await;
  let mut adapter = Adapter::new(MockConnector::new(server));
  adapter.register_collection(users_config()).await.unwrap();

  let error = adapter
    .authenticate(USERS, "ada", "wrong")
    .await
    .unwrap_err();
  assert!(matches!(
    error,
    crate::AdapterError::Store(docstore::StoreError::Rejected {
      status: 401,
      ..
    })
  ));
  assert!(!error.is_retryable());
}

#[tokio::test]
async fn teardown_releases_bindings() {
  let mut adapter = Adapter::new(MockConnector::default());
  adapter.register_collection(users_config()).await.unwrap();

  adapter.teardown();
  assert!(adapter.registry().is_empty());
  assert!(matches!(
    adapter.describe(USERS),
    Err(crate::AdapterError::UnknownCollection(_))
  ));
}
