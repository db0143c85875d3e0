//! BDD step definitions for provisioning and query behaviour.

use pgprovision::ClassificationMode;
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{
    FailureKind, ProvisionContext, ProvisionOutcome, QueryOutcome, SINGLE_ROW_TABLE,
};

#[given("a reachable host")]
fn reachable_host() -> ProvisionContext {
    ProvisionContext::new(ClassificationMode::ExitStatus)
}

#[given("a reachable host using stderr classification")]
fn reachable_host_with_stderr_rule() -> ProvisionContext {
    ProvisionContext::new(ClassificationMode::Stderr)
}

#[given("a host that refuses connections")]
fn refusing_host() -> ProvisionContext {
    let context = ProvisionContext::new(ClassificationMode::ExitStatus);
    context
        .connector
        .refuse_connections("ssh: connect to host 192.168.56.103 port 22: Connection refused");
    context
}

#[given("every provisioning step succeeds")]
fn every_step_succeeds(provision_context: &ProvisionContext) {
    for _ in 0..4 {
        provision_context.connector.push_success("");
    }
}

#[given("step \"{step}\" fails with \"{stderr}\"")]
fn step_fails(provision_context: &ProvisionContext, step: usize, stderr: String) {
    for _ in 1..step {
        provision_context.connector.push_success("");
    }
    provision_context.connector.push_failure(1, stderr);
}

#[given("the session drops during step \"{step}\"")]
fn session_drops(provision_context: &ProvisionContext, step: usize) {
    for _ in 1..step {
        provision_context.connector.push_success("");
    }
    provision_context
        .connector
        .push_transport_error("Connection to 192.168.56.103 closed by remote host.");
}

#[given("the image pull reports progress on stderr")]
fn pull_reports_progress(provision_context: &ProvisionContext) {
    let connector = &provision_context.connector;
    connector.push_success("pg_data_volume\n");
    connector.push_output(Some(0), "", "Using default tag: latest");
    connector.push_success("4f1c0c1e\n");
    connector.push_success("");
}

#[given("the database answers with a single row")]
fn database_answers(provision_context: &ProvisionContext) {
    provision_context.connector.push_success(SINGLE_ROW_TABLE);
}

#[given("psql prints \"{stdout}\" and reports \"{stderr}\"")]
fn psql_prints_both(provision_context: &ProvisionContext, stdout: String, stderr: String) {
    provision_context
        .connector
        .push_output(Some(1), stdout, stderr);
}

#[given("the session drops before the query runs")]
fn session_drops_before_query(provision_context: &ProvisionContext) {
    provision_context
        .connector
        .push_transport_error("Connection to 192.168.56.103 closed by remote host.");
}

#[when("I provision the host")]
fn provision_host(provision_context: &ProvisionContext) -> ProvisionOutcome {
    provision_context.provision()
}

#[when("I run the query \"{sql}\"")]
fn run_query(provision_context: &ProvisionContext, sql: String) -> QueryOutcome {
    provision_context.query(&sql)
}

#[then("provisioning completes after \"{count}\" steps")]
fn provisioning_completes(provision_outcome: &ProvisionOutcome, count: usize) {
    match provision_outcome.result {
        Ok(steps) => assert_eq!(steps, count),
        Err(ref failure) => panic!("expected success, got failure: {}", failure.message),
    }
}

#[then("provisioning aborts at step \"{step}\" with \"{reason}\"")]
fn provisioning_aborts(provision_outcome: &ProvisionOutcome, step: usize, reason: String) {
    let Err(ref failure) = provision_outcome.result else {
        panic!("expected provisioning to abort");
    };
    assert_eq!(failure.kind, FailureKind::Command, "{}", failure.message);
    assert_eq!(failure.step, Some(step));
    assert_eq!(failure.reason.as_deref(), Some(reason.as_str()));
    assert!(
        failure.message.contains(&reason),
        "error message should carry the captured text: {}",
        failure.message
    );
}

#[then("provisioning fails with a transport error")]
fn provisioning_transport_failure(provision_outcome: &ProvisionOutcome) {
    let Err(ref failure) = provision_outcome.result else {
        panic!("expected a transport failure");
    };
    assert_eq!(failure.kind, FailureKind::Transport, "{}", failure.message);
}

#[then("provisioning fails to connect")]
fn provisioning_connect_failure(provision_outcome: &ProvisionOutcome) {
    let Err(ref failure) = provision_outcome.result else {
        panic!("expected a connection failure");
    };
    assert_eq!(failure.kind, FailureKind::Connect, "{}", failure.message);
    assert!(
        failure.message.contains("Connection refused"),
        "message: {}",
        failure.message
    );
}

#[then("only \"{count}\" commands reached the host")]
fn commands_reached_host(provision_outcome: &ProvisionOutcome, count: usize) {
    assert_eq!(
        provision_outcome.commands.len(),
        count,
        "commands: {:?}",
        provision_outcome.commands
    );
}

#[then("the session is closed exactly once")]
fn session_closed_once(provision_outcome: &ProvisionOutcome) {
    assert_eq!(provision_outcome.closes, 1);
}

#[then("the query result is the single row table")]
fn query_returns_table(query_outcome: &QueryOutcome) {
    match query_outcome.result {
        Ok(ref text) => assert_eq!(text, SINGLE_ROW_TABLE),
        Err(ref failure) => panic!("query failed: {}", failure.message),
    }
}

#[then("the query result is \"{text}\"")]
fn query_returns_text(query_outcome: &QueryOutcome, text: String) {
    match query_outcome.result {
        Ok(ref result) => assert_eq!(result, &text),
        Err(ref failure) => panic!("query failed: {}", failure.message),
    }
}

#[then("the query fails with a transport error")]
fn query_transport_failure(query_outcome: &QueryOutcome) {
    let Err(ref failure) = query_outcome.result else {
        panic!("expected the query to fail");
    };
    assert!(failure.transport, "unexpected failure: {}", failure.message);
}

#[then("the session is closed after the query")]
fn session_closed_after_query(query_outcome: &QueryOutcome) {
    assert_eq!(query_outcome.closes, 1);
}
