//! Graph code generation (Cypher text).

use super::required_filter;
use crate::error::QueryResult;
use crate::uql::ast::{Action, Clause, Condition, Intent, Literal};
use crate::validator::validate_identifier;

pub fn compile(intent: &Intent) -> QueryResult<String> {
    let label = validate_identifier(&intent.entity)?;
    match intent.action {
        Action::Find => Ok(match intent.filter() {
            Some(condition) => format!(
                "MATCH (n:{}) WHERE {} RETURN n;",
                label,
                render_condition(condition)?
            ),
            None => format!("MATCH (n:{}) RETURN n;", label),
        }),
        Action::Create => {
            let mut props = Vec::with_capacity(intent.payload.len());
            for (field, value) in &intent.payload {
                props.push(format!("{}: {}", validate_identifier(field)?, literal(value)));
            }
            Ok(format!(
                "CREATE (n:{} {{{}}}) RETURN n;",
                label,
                props.join(", ")
            ))
        }
        Action::Delete => {
            let condition = required_filter(intent)?;
            Ok(format!(
                "MATCH (n:{}) WHERE {} DELETE n;",
                label,
                render_condition(condition)?
            ))
        }
        Action::Update => {
            let condition = required_filter(intent)?;
            let mut sets = Vec::with_capacity(intent.payload.len());
            for (field, value) in &intent.payload {
                sets.push(format!("n.{} = {}", validate_identifier(field)?, literal(value)));
            }
            Ok(format!(
                "MATCH (n:{}) WHERE {} SET {} RETURN n;",
                label,
                render_condition(condition)?,
                sets.join(", ")
            ))
        }
    }
}

fn render_condition(condition: &Condition) -> QueryResult<String> {
    let mut groups = Vec::with_capacity(condition.groups.len());
    for group in &condition.groups {
        let mut parts = Vec::with_capacity(group.len());
        for clause in group {
            parts.push(match clause {
                // HAS names a relationship type on graph backends
                Clause::Has { field } => {
                    format!("(n)-[:{}]->()", validate_identifier(field)?.to_uppercase())
                }
                Clause::Compare { field, op, value } => format!(
                    "n.{} {} {}",
                    validate_identifier(field)?,
                    op.symbol(),
                    literal(value)
                ),
            });
        }
        groups.push(parts.join(" AND "));
    }
    Ok(groups.join(" OR "))
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => format!("{:?}", f),
        Literal::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::uql::parse;

    fn cypher(uql: &str) -> QueryResult<String> {
        compile(&parse(uql)?)
    }

    #[test]
    fn test_find_with_and() {
        assert_eq!(
            cypher("FIND User WHERE age > 25 AND active = true").unwrap(),
            "MATCH (n:User) WHERE n.age > 25 AND n.active = true RETURN n;"
        );
    }

    #[test]
    fn test_find_without_condition() {
        assert_eq!(cypher("FIND User").unwrap(), "MATCH (n:User) RETURN n;");
    }

    #[test]
    fn test_has_becomes_relationship_pattern() {
        assert_eq!(
            cypher("FIND User WHERE HAS friends OR name = 'Bo'").unwrap(),
            "MATCH (n:User) WHERE (n)-[:FRIENDS]->() OR n.name = \"Bo\" RETURN n;"
        );
    }

    #[test]
    fn test_create_node() {
        assert_eq!(
            cypher(r#"CREATE User {name: "Veeresh", age: 23, ratio: 2.0, ok: TRUE}"#).unwrap(),
            "CREATE (n:User {name: \"Veeresh\", age: 23, ratio: 2.0, ok: true}) RETURN n;"
        );
    }

    #[test]
    fn test_delete_and_update() {
        assert_eq!(
            cypher("DELETE User WHERE inactive = true").unwrap(),
            "MATCH (n:User) WHERE n.inactive = true DELETE n;"
        );
        assert_eq!(
            cypher("UPDATE User SET tier: 'gold' WHERE age > 30").unwrap(),
            "MATCH (n:User) WHERE n.age > 30 SET n.tier = \"gold\" RETURN n;"
        );
        assert!(matches!(
            cypher("DELETE User").unwrap_err(),
            QueryError::Validation { .. }
        ));
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(
            cypher(r#"FIND User WHERE name = 'say "hi"'"#).unwrap(),
            "MATCH (n:User) WHERE n.name = \"say \\\"hi\\\"\" RETURN n;"
        );
    }
}
