//! Purpose: Hold top-level CLI command dispatch for `ravendb`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each subcommand performs its requests through the library, never raw `ureq`.
//! Invariants: Database-scoped subcommands fail with a usage error before any I/O without --database.

use super::*;
use ravendb_client::api::command::{
    DatabaseRecord, GetClusterTopologyCommand, GetTopologyCommand, RawCommand,
};
use ravendb_client::api::{
    CreateDatabaseOperation, DeleteDatabaseOperation, GetDatabaseNamesOperation,
    GetStatisticsOperation, IndexCreationTask, Method, PutDocumentOperation, RemoveClusterNode,
    StartIndexingOperation, StopIndexingOperation, TypedCommand,
};
use serde::Serialize;

/// Page size used when walking every database name for cleanup.
const CLEANUP_PAGE_SIZE: usize = 128;

pub(super) fn dispatch_command(cli: Cli) -> Result<RunOutcome, Error> {
    if let Command::Completion { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::aot::generate(*shell, &mut cmd, "ravendb", &mut io::stdout());
        return Ok(RunOutcome::ok());
    }

    let store = build_store(&cli)?;
    match &cli.command {
        Command::Completion { .. } => Ok(RunOutcome::ok()),
        Command::Databases { command } => dispatch_databases(&store, command),
        Command::Stats { debug_tag } => {
            require_database(&cli)?;
            let mut operation = GetStatisticsOperation::new();
            if let Some(tag) = debug_tag {
                operation = operation.with_debug_tag(tag.clone());
            }
            let stats = store.maintenance().send(&operation)?;
            emit_json(to_json(&stats)?);
            Ok(RunOutcome::ok())
        }
        Command::Topology => {
            require_database(&cli)?;
            let mut command = GetTopologyCommand::new();
            store.execute(&mut command)?;
            emit_json(to_json(&command.into_result())?);
            Ok(RunOutcome::ok())
        }
        Command::Cluster { command } => match command {
            ClusterCommand::Topology => {
                let mut command = GetClusterTopologyCommand::new();
                store.execute(&mut command)?;
                emit_json(to_json(&command.into_result())?);
                Ok(RunOutcome::ok())
            }
            ClusterCommand::RemoveNode { node, tag } => {
                let mut request = RemoveClusterNode::new(node.clone());
                if let Some(tag) = tag {
                    request.tag = tag.clone();
                }
                let removed = store.maintenance().send(&request)?;
                emit_json(to_json(&removed)?);
                Ok(RunOutcome::ok())
            }
        },
        Command::Indexing { command } => {
            require_database(&cli)?;
            let (action, result) = match command {
                IndexingCommand::Stop => (
                    "stopped",
                    store.maintenance().send_void(&StopIndexingOperation::new()),
                ),
                IndexingCommand::Start => (
                    "started",
                    store.maintenance().send_void(&StartIndexingOperation::new()),
                ),
            };
            result?;
            emit_json(json!({ "indexing": action, "database": store.database() }));
            Ok(RunOutcome::ok())
        }
        Command::Indexes { command } => {
            require_database(&cli)?;
            let IndexesCommand::Put { name, map, reduce } = command;
            let mut task = IndexCreationTask::new(name.clone())?;
            match map.as_slice() {
                [single] => task.map = Some(single.clone()),
                many => task.maps = many.to_vec(),
            }
            task.reduce = reduce.clone();
            let results = task.execute(&store, None, None)?;
            emit_json(to_json(&results)?);
            Ok(RunOutcome::ok())
        }
        Command::Put {
            id,
            json,
            collection,
            change_vector,
        } => {
            require_database(&cli)?;
            let document = parse_json_arg(json, "document")?;
            let mut operation = PutDocumentOperation::new(id.clone(), document);
            if let Some(collection) = collection {
                operation = operation.with_collection_type(collection.clone());
            }
            if let Some(change_vector) = change_vector {
                operation = operation.with_change_vector(change_vector.clone());
            }
            let result = store.maintenance().send(&operation)?;
            emit_json(to_json(&result)?);
            Ok(RunOutcome::ok())
        }
        Command::Query {
            rql,
            wait_for_non_stale,
            random,
            seed,
            no_caching,
            stream,
            take,
        } => {
            require_database(&cli)?;
            let mut query = store.query(rql.clone());
            if let Some(take) = take {
                query = query.take(*take);
            }
            let mut customization = query.customize();
            if let Some(timeout) = wait_for_non_stale {
                customization.wait_for_non_stale_results(timeout.map(Duration::from_secs));
            }
            match seed {
                Some(seed) => {
                    customization.random_ordering_with_seed(seed.clone());
                }
                None if *random => {
                    customization.random_ordering();
                }
                None => {}
            }
            if *no_caching {
                customization.no_caching();
            }
            if *stream {
                let results = query.stream(&store)?;
                emit_json(json!({ "results": results }));
            } else {
                let result = query.execute(&store)?;
                emit_json(to_json(&result)?);
            }
            Ok(RunOutcome::ok())
        }
        Command::Raw {
            method,
            template,
            body,
        } => {
            let method = Method::parse(method).ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("unsupported method '{method}'"))
                    .with_hint("Use GET, POST, PUT, or DELETE.")
            })?;
            let mut command = RawCommand::new(method, template.clone());
            if let Some(body) = body {
                command = command.with_body(parse_json_arg(body, "request body")?);
            }
            store.execute(&mut command)?;
            emit_json(command.into_result().unwrap_or(Value::Null));
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_databases(
    store: &DocumentStore,
    command: &DatabasesCommand,
) -> Result<RunOutcome, Error> {
    let maintenance = store.maintenance();
    match command {
        DatabasesCommand::List { start, page_size } => {
            let names = maintenance.send(&GetDatabaseNamesOperation::new(*start, *page_size))?;
            let databases = names.map(|names| names.databases).unwrap_or_default();
            emit_json(json!({ "databases": databases }));
        }
        DatabasesCommand::Create {
            name,
            replication_factor,
        } => {
            let operation = CreateDatabaseOperation::new(DatabaseRecord::new(name.clone()))
                .with_replication_factor(*replication_factor);
            let result = maintenance.send(&operation)?;
            emit_json(to_json(&result)?);
        }
        DatabasesCommand::Delete {
            name,
            hard_delete,
            from_node,
        } => {
            let mut operation = DeleteDatabaseOperation::new(name.clone(), *hard_delete);
            if let Some(node) = from_node {
                operation = operation.from_node(node.clone());
            }
            let result = maintenance.send(&operation)?;
            emit_json(to_json(&result)?);
        }
        DatabasesCommand::Cleanup { prefix } => {
            if prefix.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("cleanup prefix cannot be empty")
                    .with_hint("Pass --prefix, e.g. --prefix tst_."));
            }
            let mut matching = Vec::new();
            let mut start = 0;
            loop {
                let page = maintenance
                    .send(&GetDatabaseNamesOperation::new(start, Some(CLEANUP_PAGE_SIZE)))?
                    .map(|names| names.databases)
                    .unwrap_or_default();
                let fetched = page.len();
                matching.extend(page.into_iter().filter(|name| name.starts_with(prefix.as_str())));
                if fetched < CLEANUP_PAGE_SIZE {
                    break;
                }
                start += fetched;
            }
            for name in &matching {
                tracing::info!(database = %name, "deleting database");
                maintenance.send(&DeleteDatabaseOperation::new(name.clone(), true))?;
            }
            emit_json(json!({ "deleted": matching }));
        }
    }
    Ok(RunOutcome::ok())
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("failed to render result as JSON")
            .with_source(err)
    })
}
