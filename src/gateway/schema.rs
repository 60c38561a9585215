//! Schema composition
//! Parses each subgraph's SDL and composes the routing table that maps
//! every root field to the subgraph that owns it

use async_graphql_parser::types::{TypeKind, TypeSystemDefinition};
use async_graphql_parser::{parse_schema, types::OperationType};
use std::collections::HashMap;

use crate::{GatewayError, Result};

/// The root fields one subgraph contributes to the composed surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphSchema {
    pub name: String,
    pub query_fields: Vec<String>,
    pub mutation_fields: Vec<String>,
}

impl SubgraphSchema {
    /// Parse a subgraph's SDL and collect its Query and Mutation root
    /// fields.
    ///
    /// Honors `schema { query: ... }` root overrides and `extend type`
    /// definitions. Federation's built-in `_service` and `_entities`
    /// fields are implementation plumbing and are not exposed upward.
    pub fn parse(name: &str, sdl: &str) -> Result<Self> {
        let document = parse_schema(sdl).map_err(|e| {
            GatewayError::Composition(format!("subgraph '{}' SDL does not parse: {}", name, e))
        })?;

        // Root type names default to Query/Mutation unless the schema
        // definition renames them
        let mut query_root = "Query".to_string();
        let mut mutation_root = "Mutation".to_string();
        for definition in &document.definitions {
            if let TypeSystemDefinition::Schema(schema_def) = definition {
                if let Some(query) = &schema_def.node.query {
                    query_root = query.node.to_string();
                }
                if let Some(mutation) = &schema_def.node.mutation {
                    mutation_root = mutation.node.to_string();
                }
            }
        }

        let mut query_fields = Vec::new();
        let mut mutation_fields = Vec::new();
        for definition in &document.definitions {
            let type_def = match definition {
                TypeSystemDefinition::Type(t) => &t.node,
                _ => continue,
            };
            let fields = match &type_def.kind {
                TypeKind::Object(object) => &object.fields,
                _ => continue,
            };
            let type_name = type_def.name.node.as_str();
            let bucket = if type_name == query_root {
                &mut query_fields
            } else if type_name == mutation_root {
                &mut mutation_fields
            } else {
                continue;
            };
            for field in fields {
                let field_name = field.node.name.node.to_string();
                if field_name.starts_with('_') {
                    continue;
                }
                bucket.push(field_name);
            }
        }

        Ok(Self {
            name: name.to_string(),
            query_fields,
            mutation_fields,
        })
    }
}

/// Routing table mapping each root field to its owning subgraph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    query_fields: HashMap<String, String>,
    mutation_fields: HashMap<String, String>,
}

impl RoutingTable {
    /// The subgraph owning `field` under the given operation type, if any
    pub fn owner(&self, operation: OperationType, field: &str) -> Option<&str> {
        let map = match operation {
            OperationType::Query => &self.query_fields,
            OperationType::Mutation => &self.mutation_fields,
            OperationType::Subscription => return None,
        };
        map.get(field).map(String::as_str)
    }

    /// Total number of routable root fields
    pub fn len(&self) -> usize {
        self.query_fields.len() + self.mutation_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compose subgraph schemas into one routing table.
///
/// Two subgraphs claiming the same root field is a composition error -
/// permanent, never retried, because re-fetching the same schemas cannot
/// resolve the conflict.
pub fn compose(schemas: &[SubgraphSchema]) -> Result<RoutingTable> {
    let mut table = RoutingTable::default();

    for schema in schemas {
        for field in &schema.query_fields {
            if let Some(existing) = table
                .query_fields
                .insert(field.clone(), schema.name.clone())
            {
                return Err(GatewayError::Composition(format!(
                    "query field '{}' is owned by both '{}' and '{}'",
                    field, existing, schema.name
                )));
            }
        }
        for field in &schema.mutation_fields {
            if let Some(existing) = table
                .mutation_fields
                .insert(field.clone(), schema.name.clone())
            {
                return Err(GatewayError::Composition(format!(
                    "mutation field '{}' is owned by both '{}' and '{}'",
                    field, existing, schema.name
                )));
            }
        }
    }

    Ok(table)
}
