//! Purpose: End-to-end tests for commands and operations over real HTTP.
//! Exports: None (integration test module).
//! Role: Validate status classification, result decoding, and database resolution across TCP.
//! Invariants: Uses a loopback-only stub server; each test owns its server.
//! Invariants: Server threads are shut down on drop.

mod common;

use common::{CURRENT_CHANGE_VECTOR, StubServer, TestResult, closed_url};
use ravendb_client::api::command::{
    DatabaseRecord, GetClusterTopologyCommand, GetDatabaseNamesCommand, GetStatisticsCommand,
    GetTopologyCommand, RawCommand, StopIndexingCommand,
};
use ravendb_client::api::{
    CancelToken, CreateDatabaseOperation, DeleteDatabaseOperation, DocumentStore, ErrorKind,
    Executor, GetDatabaseNamesOperation, GetStatisticsOperation, HttpExecutor,
    IndexCreationTask, Method, PutDocumentOperation, RemoveClusterNode, ServerNode,
    StartIndexingOperation, StopIndexingOperation, TypedCommand, UreqTransport,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn store(server: &StubServer, database: &str) -> TestResult<DocumentStore> {
    Ok(DocumentStore::new(server.url(), database)?)
}

fn executor() -> HttpExecutor {
    HttpExecutor::with_transport(UreqTransport::new().with_timeout(Duration::from_secs(5)))
}

#[test]
fn database_names_preserve_server_order() -> TestResult<()> {
    let server = StubServer::start()?;
    let node = ServerNode::new(server.url(), "", "A");
    let mut command = GetDatabaseNamesCommand::new(0, 32);
    executor().execute(&mut command, &node)?;
    let names = command.into_result().expect("names");
    assert_eq!(names.databases, vec!["a", "b"]);
    Ok(())
}

#[test]
fn unknown_database_is_service_unavailable() -> TestResult<()> {
    let server = StubServer::start()?;
    let node = ServerNode::new(server.url(), "invalid-database", "A");
    let mut command = GetTopologyCommand::new();
    let err = executor()
        .execute(&mut command, &node)
        .expect_err("unknown database");
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(err.status(), Some(503));
    assert_eq!(
        err.url(),
        Some(format!("{}/topology?name=invalid-database", server.url()).as_str())
    );
    assert!(command.result().is_none());
    Ok(())
}

#[test]
fn stop_and_start_indexing_accept_no_content() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "db1")?;
    store.maintenance().send_void(&StopIndexingOperation::new())?;
    store.maintenance().send_void(&StartIndexingOperation::new())?;

    let err = store
        .maintenance()
        .send_void(&StopIndexingOperation::for_database("nope"))
        .expect_err("unknown database");
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert!(err.url().is_some_and(|url| url.contains("/databases/nope/")));
    Ok(())
}

#[test]
fn remove_node_round_trips_record() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "")?;
    let removed = store
        .maintenance()
        .send(&RemoveClusterNode::new("B"))?
        .expect("record");
    assert_eq!(removed, RemoveClusterNode::new("B"));
    assert_eq!(
        serde_json::to_value(&removed)?,
        json!({ "Node": "B", "Tag": "B" })
    );
    Ok(())
}

#[test]
fn statistics_treat_404_as_absent() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "db1")?;

    let stats = store
        .maintenance()
        .send(&GetStatisticsOperation::new())?
        .expect("stats");
    assert_eq!(stats.count_of_documents, 1059);
    assert_eq!(stats.indexes[0].name, "Orders/Totals");

    let missing = store
        .maintenance()
        .send(&GetStatisticsOperation::new().for_database("missing"))?;
    assert!(missing.is_none());
    Ok(())
}

#[test]
fn server_error_body_is_surfaced() -> TestResult<()> {
    let server = StubServer::start()?;
    let node = ServerNode::new(server.url(), "crashing", "A");
    let mut command = GetStatisticsCommand::new(None);
    let err = executor()
        .execute(&mut command, &node)
        .expect_err("server error");
    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(err.message(), Some("Database 'crashing' was not found"));
    assert_eq!(
        err.server_type(),
        Some("Raven.Server.Exceptions.Database.DatabaseDoesNotExistException")
    );
    Ok(())
}

#[test]
fn invalid_endpoint_is_bad_request() -> TestResult<()> {
    let server = StubServer::start()?;
    let node = ServerNode::new(server.url(), "db1", "A");
    let mut command = RawCommand::new(Method::Get, "{url}/no/such/command");
    let err = executor()
        .execute(&mut command, &node)
        .expect_err("bad request");
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(command.result().is_none());

    let mut command = RawCommand::new(Method::Get, "{url}/unauthorized");
    let err = executor()
        .execute(&mut command, &node)
        .expect_err("unauthorized");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    Ok(())
}

#[test]
fn malformed_success_body_is_decode_error() -> TestResult<()> {
    let server = StubServer::start()?;
    let node = ServerNode::new(server.url(), "db1", "A");
    let mut command = RawCommand::new(Method::Get, "{url}/databases/{db}/garbage");
    let err = executor()
        .execute(&mut command, &node)
        .expect_err("decode");
    assert_eq!(err.kind(), ErrorKind::Decode);
    Ok(())
}

#[test]
fn connection_refused_is_transport_error() -> TestResult<()> {
    let node = ServerNode::new(closed_url()?, "db1", "A");
    let mut command = StopIndexingCommand::new();
    let err = executor()
        .execute(&mut command, &node)
        .expect_err("transport");
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), None);
    Ok(())
}

#[test]
fn cancelled_executor_never_sends() -> TestResult<()> {
    let server = StubServer::start()?;
    let token = CancelToken::new();
    token.cancel();
    let executor = executor().with_cancel_token(token);
    let node = ServerNode::new(server.url(), "", "A");
    let mut command = GetDatabaseNamesCommand::new(0, 32);
    let err = executor
        .execute(&mut command, &node)
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(command.result().is_none());
    Ok(())
}

#[test]
fn create_then_cleanup_test_databases() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "")?;
    let maintenance = store.maintenance();

    let created = maintenance
        .send(&CreateDatabaseOperation::new(DatabaseRecord::new("tst_orders")))?
        .expect("created");
    assert_eq!(created.name, "tst_orders");
    assert!(created.raft_command_index > 0);

    let err = maintenance
        .send(&CreateDatabaseOperation::new(DatabaseRecord::new("tst_orders")))
        .expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let deleted = maintenance
        .send(&DeleteDatabaseOperation::new("tst_orders", true))?
        .expect("deleted");
    assert_eq!(deleted.raft_command_index, 9);

    let names = maintenance
        .send(&GetDatabaseNamesOperation::new(0, None))?
        .expect("names");
    assert_eq!(names.databases, vec!["a", "b"]);
    Ok(())
}

#[test]
fn put_document_sets_collection_and_honors_change_vector() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "db1")?;

    let stored = store
        .maintenance()
        .send(&PutDocumentOperation::new("", json!({ "Name": "John" })).with_collection_type("User"))?
        .expect("put");
    assert!(stored.id.starts_with("users/"));
    assert_eq!(stored.change_vector.as_deref(), Some(CURRENT_CHANGE_VECTOR));

    let err = store
        .maintenance()
        .send(
            &PutDocumentOperation::new("users/1", json!({ "Name": "Jane" }))
                .with_change_vector("A:0-stale"),
        )
        .expect_err("conflict");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    Ok(())
}

#[test]
fn index_creation_task_publishes_definition() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "")?;
    let mut task = IndexCreationTask::new("Users_ByName")?;
    task.map = Some("from u in docs.Users select new { u.Name }".to_string());

    let err = task.execute(&store, None, None).expect_err("no database");
    assert_eq!(err.kind(), ErrorKind::Usage);

    let results = task.execute(&store, None, Some("db1"))?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].index, "Users/ByName");
    Ok(())
}

#[test]
fn document_query_runs_listeners_over_http() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "db1")?;
    let calls = Arc::new(AtomicUsize::new(0));

    let mut query = store.query("from Users");
    let counter = Arc::clone(&calls);
    let mut customization = query.customize();
    customization
        .no_caching()
        .random_ordering_with_seed("fixed");
    customization.add_after_query_executed_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = query.execute(&store)?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.results[0]["Query"], "from Users order by random('fixed')");
    assert_eq!(result.result_etag, 0);

    let streamed = query.stream(&store)?;
    assert_eq!(streamed.len(), 2);
    Ok(())
}

#[test]
fn cluster_topology_lists_members() -> TestResult<()> {
    let server = StubServer::start()?;
    let store = store(&server, "")?;
    let mut command = GetClusterTopologyCommand::new();
    store.execute(&mut command)?;
    let topology = command.into_result().expect("topology");
    assert_eq!(topology.leader, "A");
    assert_eq!(
        topology.topology.members.get("A").map(String::as_str),
        Some(server.url())
    );
    Ok(())
}
