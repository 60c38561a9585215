//! Query dispatch
//! Splits an inbound request into per-subgraph subqueries, dispatches them,
//! and merges the answers back into one GraphQL response
//!
//! Failure isolation: a failing subgraph yields `null` for the fields it
//! owns plus a per-field error entry, and is logged individually. It never
//! aborts the dispatches to its siblings - one flaky service must not take
//! the whole composed surface down.

use async_graphql_parser::types::{
    DocumentOperations, Field, OperationDefinition, OperationType, Selection,
};
use async_graphql_parser::{parse_query, Positioned};
use async_graphql_value::Name;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::gateway::client::{SubgraphClient, SubgraphRequest};
use crate::gateway::query::{collect_variables, print_subquery};
use crate::gateway::schema::RoutingTable;
use crate::subgraph::SubgraphEndpoint;
use crate::{GatewayError, Result};

/// An inbound GraphQL-over-HTTP request body
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLHttpRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

/// Routes top-level fields to their owning subgraphs and merges the results
pub struct QueryExecutor {
    endpoints: Vec<SubgraphEndpoint>,
    client: Arc<dyn SubgraphClient>,
    table: RwLock<RoutingTable>,
}

/// One subgraph's share of a request: the fields it owns, in request order
struct DispatchGroup<'a> {
    subgraph: String,
    fields: Vec<(String, &'a Positioned<Field>)>,
}

impl QueryExecutor {
    pub fn new(
        endpoints: Vec<SubgraphEndpoint>,
        client: Arc<dyn SubgraphClient>,
        table: RoutingTable,
    ) -> Self {
        Self {
            endpoints,
            client,
            table: RwLock::new(table),
        }
    }

    /// Replace the routing table (used by the schema-refresh poller)
    pub async fn swap_table(&self, table: RoutingTable) {
        *self.table.write().await = table;
    }

    /// Execute a request against the composed surface.
    ///
    /// Always returns a complete GraphQL response body; request-level
    /// problems (parse failures, unknown fields, unsupported constructs)
    /// become `errors` entries rather than transport failures.
    pub async fn execute(&self, request: &GraphQLHttpRequest) -> Value {
        let document = match parse_query(&request.query) {
            Ok(document) => document,
            Err(e) => return error_response(format!("GraphQL parse error: {}", e)),
        };

        let operation = match select_operation(&document.operations, &request.operation_name) {
            Ok(operation) => operation,
            Err(message) => return error_response(message),
        };
        if operation.ty == OperationType::Subscription {
            return error_response("subscriptions are not supported by the gateway".to_string());
        }

        // Plan: map every top-level field to its owner, preserving order
        let mut plan: Vec<(String, PlannedField)> = Vec::new();
        {
            let table = self.table.read().await;
            for item in &operation.selection_set.node.items {
                let field = match &item.node {
                    Selection::Field(field) => field,
                    _ => {
                        return error_response(
                            "fragments at the root of an operation are not supported".to_string(),
                        )
                    }
                };
                let response_key = field
                    .node
                    .alias
                    .as_ref()
                    .map(|a| a.node.to_string())
                    .unwrap_or_else(|| field.node.name.node.to_string());
                let field_name = field.node.name.node.as_str();

                // Introspection of the root type name is answered locally
                if field_name == "__typename" {
                    plan.push((response_key, PlannedField::TypeName(operation.ty)));
                    continue;
                }

                match table.owner(operation.ty, field_name) {
                    Some(owner) => {
                        plan.push((response_key, PlannedField::Routed(owner.to_string(), field)))
                    }
                    None => {
                        return error_response(format!(
                            "unknown top-level field '{}'",
                            field_name
                        ))
                    }
                }
            }
        }

        // Group routed fields by owner, preserving first-appearance order
        let mut groups: Vec<DispatchGroup> = Vec::new();
        for (key, planned) in &plan {
            if let PlannedField::Routed(owner, field) = planned {
                match groups.iter_mut().find(|g| &g.subgraph == owner) {
                    Some(group) => group.fields.push((key.clone(), field)),
                    None => groups.push(DispatchGroup {
                        subgraph: owner.clone(),
                        fields: vec![(key.clone(), field)],
                    }),
                }
            }
        }

        // Queries fan out concurrently; mutations run in request order
        let mut outcomes = Vec::with_capacity(groups.len());
        if operation.ty == OperationType::Mutation {
            for group in &groups {
                outcomes.push(self.dispatch(operation, group, request).await);
            }
        } else {
            outcomes = futures::future::join_all(
                groups
                    .iter()
                    .map(|group| self.dispatch(operation, group, request)),
            )
            .await;
        }

        // Merge: every planned key present, null until a subgraph fills it
        let mut data = Map::new();
        for (key, planned) in &plan {
            match planned {
                PlannedField::TypeName(ty) => {
                    let type_name = if *ty == OperationType::Mutation {
                        "Mutation"
                    } else {
                        "Query"
                    };
                    data.insert(key.clone(), Value::String(type_name.to_string()));
                }
                PlannedField::Routed(..) => {
                    data.insert(key.clone(), Value::Null);
                }
            }
        }

        let mut errors: Vec<Value> = Vec::new();
        for (group, outcome) in groups.iter().zip(outcomes) {
            match outcome {
                Ok(body) => {
                    if let Some(subgraph_data) = body.get("data").and_then(Value::as_object) {
                        for (key, _) in &group.fields {
                            if let Some(value) = subgraph_data.get(key) {
                                data.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    if let Some(subgraph_errors) = body.get("errors").and_then(Value::as_array) {
                        errors.extend(subgraph_errors.iter().cloned());
                    }
                }
                Err(e) => {
                    // One failing subgraph nulls its own fields only
                    warn!("❌ subgraph '{}' request failed: {}", group.subgraph, e);
                    for (key, _) in &group.fields {
                        errors.push(json!({
                            "message": format!("subgraph '{}' request failed: {}", group.subgraph, e),
                            "path": [key],
                        }));
                    }
                }
            }
        }

        let mut response = json!({ "data": Value::Object(data) });
        if !errors.is_empty() {
            response["errors"] = Value::Array(errors);
        }
        response
    }

    /// Build and send one subgraph's subquery
    async fn dispatch(
        &self,
        operation: &OperationDefinition,
        group: &DispatchGroup<'_>,
        request: &GraphQLHttpRequest,
    ) -> Result<Value> {
        let endpoint = self
            .endpoints
            .iter()
            .find(|e| e.name == group.subgraph)
            .ok_or_else(|| {
                GatewayError::Internal(format!(
                    "routing table references unknown subgraph '{}'",
                    group.subgraph
                ))
            })?;

        let fields: Vec<&Positioned<Field>> = group.fields.iter().map(|(_, f)| *f).collect();
        let subquery = print_subquery(operation.ty, &operation.variable_definitions, &fields)?;

        let mut used = HashSet::new();
        for field in &fields {
            collect_variables(&field.node, &mut used);
        }
        let variables = prune_variables(&request.variables, &used);

        let subgraph_request = SubgraphRequest {
            query: subquery,
            variables,
            operation_name: None,
        };
        self.client.execute(endpoint, &subgraph_request).await
    }
}

enum PlannedField<'a> {
    /// Forwarded to the named subgraph
    Routed(String, &'a Positioned<Field>),
    /// `__typename` at the root, answered locally
    TypeName(OperationType),
}

/// Keep only the variables a subquery actually references
fn prune_variables(variables: &Option<Value>, used: &HashSet<Name>) -> Option<Value> {
    let map = variables.as_ref()?.as_object()?;
    let pruned: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| used.iter().any(|name| name.as_str() == key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if pruned.is_empty() {
        None
    } else {
        Some(Value::Object(pruned))
    }
}

fn select_operation<'a>(
    operations: &'a DocumentOperations,
    operation_name: &Option<String>,
) -> std::result::Result<&'a OperationDefinition, String> {
    match (operations, operation_name) {
        (DocumentOperations::Single(operation), _) => Ok(&operation.node),
        (DocumentOperations::Multiple(map), Some(name)) => map
            .get(name.as_str())
            .map(|op| &op.node)
            .ok_or_else(|| format!("unknown operation '{}'", name)),
        (DocumentOperations::Multiple(map), None) => {
            let mut operations = map.values();
            match (operations.next(), operations.next()) {
                (Some(operation), None) => Ok(&operation.node),
                _ => Err(
                    "operationName is required when a document has multiple operations"
                        .to_string(),
                ),
            }
        }
    }
}

/// A request-level failure rendered as a GraphQL response body
fn error_response(message: String) -> Value {
    json!({
        "data": Value::Null,
        "errors": [{ "message": message }],
    })
}
