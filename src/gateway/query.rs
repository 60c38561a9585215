//! Parameterized subquery construction
//! Re-prints top-level fields of a parsed request as standalone subqueries
//! for the owning subgraph
//!
//! Subqueries are built from the AST, never by splicing request strings:
//! the static query shape and the substituted identifiers stay separated
//! all the way to serialization, which closes the injection surface the
//! old string-concatenated proxy resolvers had.

use async_graphql_parser::types::{
    Directive, Field, OperationType, Selection, SelectionSet, VariableDefinition,
};
use async_graphql_parser::Positioned;
use async_graphql_value::{Name, Value};
use std::collections::HashSet;
use std::fmt::Write;

use crate::{GatewayError, Result};

/// Collect every variable a field (including its nested selections and
/// directives) references, so the subquery declares exactly the variable
/// definitions it uses
pub fn collect_variables(field: &Field, out: &mut HashSet<Name>) {
    for (_, value) in &field.arguments {
        collect_from_value(&value.node, out);
    }
    collect_from_directives(&field.directives, out);
    collect_from_selection_set(&field.selection_set.node, out);
}

fn collect_from_selection_set(selection_set: &SelectionSet, out: &mut HashSet<Name>) {
    for item in &selection_set.items {
        match &item.node {
            Selection::Field(field) => collect_variables(&field.node, out),
            Selection::InlineFragment(fragment) => {
                collect_from_directives(&fragment.node.directives, out);
                collect_from_selection_set(&fragment.node.selection_set.node, out);
            }
            // Rejected later by the printer; nothing to collect
            Selection::FragmentSpread(_) => {}
        }
    }
}

fn collect_from_directives(directives: &[Positioned<Directive>], out: &mut HashSet<Name>) {
    for directive in directives {
        for (_, value) in &directive.node.arguments {
            collect_from_value(&value.node, out);
        }
    }
}

fn collect_from_value(value: &Value, out: &mut HashSet<Name>) {
    match value {
        Value::Variable(name) => {
            out.insert(name.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_from_value(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_from_value(item, out);
            }
        }
        _ => {}
    }
}

/// Print a standalone subquery for one subgraph: the operation keyword, the
/// variable definitions the selected fields actually use, and the fields
/// themselves.
pub fn print_subquery(
    operation: OperationType,
    variable_definitions: &[Positioned<VariableDefinition>],
    fields: &[&Positioned<Field>],
) -> Result<String> {
    let mut used = HashSet::new();
    for field in fields {
        collect_variables(&field.node, &mut used);
    }

    let mut out = String::new();
    out.push_str(match operation {
        OperationType::Query => "query",
        OperationType::Mutation => "mutation",
        OperationType::Subscription => "subscription",
    });

    let declared: Vec<_> = variable_definitions
        .iter()
        .filter(|def| used.contains(&def.node.name.node))
        .collect();
    if !declared.is_empty() {
        out.push('(');
        for (i, def) in declared.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "${}: {}", def.node.name.node, def.node.var_type.node);
            if let Some(default) = &def.node.default_value {
                let _ = write!(out, " = {}", default.node);
            }
        }
        out.push(')');
    }

    out.push_str(" {");
    for field in fields {
        out.push(' ');
        print_field(&field.node, &mut out)?;
    }
    out.push_str(" }");

    Ok(out)
}

fn print_field(field: &Field, out: &mut String) -> Result<()> {
    if let Some(alias) = &field.alias {
        let _ = write!(out, "{}: ", alias.node);
    }
    out.push_str(field.name.node.as_str());

    if !field.arguments.is_empty() {
        out.push('(');
        for (i, (name, value)) in field.arguments.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: {}", name.node, value.node);
        }
        out.push(')');
    }

    print_directives(&field.directives, out);

    if !field.selection_set.node.items.is_empty() {
        out.push_str(" {");
        print_selection_set(&field.selection_set.node, out)?;
        out.push_str(" }");
    }

    Ok(())
}

fn print_selection_set(selection_set: &SelectionSet, out: &mut String) -> Result<()> {
    for item in &selection_set.items {
        out.push(' ');
        match &item.node {
            Selection::Field(field) => print_field(&field.node, out)?,
            Selection::InlineFragment(fragment) => {
                out.push_str("...");
                if let Some(condition) = &fragment.node.type_condition {
                    let _ = write!(out, " on {}", condition.node.on.node);
                }
                print_directives(&fragment.node.directives, out);
                out.push_str(" {");
                print_selection_set(&fragment.node.selection_set.node, out)?;
                out.push_str(" }");
            }
            Selection::FragmentSpread(spread) => {
                return Err(GatewayError::GraphQL(format!(
                    "named fragment spread '...{}' is not supported by the gateway",
                    spread.node.fragment_name.node
                )));
            }
        }
    }
    Ok(())
}

fn print_directives(directives: &[Positioned<Directive>], out: &mut String) {
    for directive in directives {
        let _ = write!(out, " @{}", directive.node.name.node);
        if !directive.node.arguments.is_empty() {
            out.push('(');
            for (i, (name, value)) in directive.node.arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}: {}", name.node, value.node);
            }
            out.push(')');
        }
    }
}
