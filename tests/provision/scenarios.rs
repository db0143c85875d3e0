//! BDD scenarios for provisioning and querying.

use rstest_bdd_macros::scenario;

use super::test_helpers::{
    ProvisionContext, ProvisionOutcome, QueryOutcome, provision_context, provision_outcome,
    query_outcome,
};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Provision a host end to end"
)]
fn scenario_provision_success(provision_context: ProvisionContext, provision_outcome: ProvisionOutcome) {
    let _ = (provision_context, provision_outcome);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Abort when the image pull is denied"
)]
fn scenario_permission_denied(provision_context: ProvisionContext, provision_outcome: ProvisionOutcome) {
    let _ = (provision_context, provision_outcome);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Abort when the session drops mid-run"
)]
fn scenario_transport_failure(provision_context: ProvisionContext, provision_outcome: ProvisionOutcome) {
    let _ = (provision_context, provision_outcome);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Refuse to run when the host rejects the connection"
)]
fn scenario_connection_refused(provision_context: ProvisionContext, provision_outcome: ProvisionOutcome) {
    let _ = (provision_context, provision_outcome);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Legacy stderr classification treats pull progress as failure"
)]
fn scenario_stderr_classification(provision_context: ProvisionContext, provision_outcome: ProvisionOutcome) {
    let _ = (provision_context, provision_outcome);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Exit status classification tolerates pull progress"
)]
fn scenario_exit_status_classification(provision_context: ProvisionContext, provision_outcome: ProvisionOutcome) {
    let _ = (provision_context, provision_outcome);
}

#[scenario(
    path = "tests/features/query.feature",
    name = "Return the psql output for a validation query"
)]
fn scenario_query_stdout(provision_context: ProvisionContext, query_outcome: QueryOutcome) {
    let _ = (provision_context, query_outcome);
}

#[scenario(
    path = "tests/features/query.feature",
    name = "Prefer error output over standard output"
)]
fn scenario_query_precedence(provision_context: ProvisionContext, query_outcome: QueryOutcome) {
    let _ = (provision_context, query_outcome);
}

#[scenario(
    path = "tests/features/query.feature",
    name = "Close the session when the query cannot run"
)]
fn scenario_query_transport(provision_context: ProvisionContext, query_outcome: QueryOutcome) {
    let _ = (provision_context, query_outcome);
}
