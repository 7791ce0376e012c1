use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::{ComponentId, Direction, Graph, NodeId, PlugFlags, PlugId, PlugSpec};
use crate::value::{Value, ValueType};

/// One parsed line.
#[derive(Debug, PartialEq)]
enum Statement<'a> {
    Node {
        type_name: &'a str,
        path: &'a str,
    },
    Plug {
        path: &'a str,
        value_type: ValueType,
        direction: Direction,
        flags: PlugFlags,
        default: serde_json::Value,
    },
    Set {
        path: &'a str,
        value: serde_json::Value,
    },
    Connect {
        destination: &'a str,
        source: &'a str,
    },
}

/// Split off the next whitespace separated word.
fn word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    Some(match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest),
        None => (text, ""),
    })
}

fn json(text: &str) -> std::result::Result<serde_json::Value, String> {
    serde_json::from_str(text.trim()).map_err(|e| format!("bad literal \"{}\": {e}", text.trim()))
}

fn parse_line(line: &str) -> std::result::Result<Option<Statement<'_>>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let missing = |what: &str| format!("missing {what}");
    let (keyword, rest) = word(line).ok_or_else(|| missing("statement"))?;
    let statement = match keyword {
        "node" => {
            let (type_name, rest) = word(rest).ok_or_else(|| missing("node type"))?;
            let (path, rest) = word(rest).ok_or_else(|| missing("node path"))?;
            if !rest.trim().is_empty() {
                return Err(format!("unexpected \"{}\"", rest.trim()));
            }
            Statement::Node { type_name, path }
        }
        "plug" => {
            let (path, rest) = word(rest).ok_or_else(|| missing("plug path"))?;
            let (value_type, rest) = word(rest).ok_or_else(|| missing("value type"))?;
            let (direction, rest) = word(rest).ok_or_else(|| missing("direction"))?;
            let (flags, rest) = word(rest).ok_or_else(|| missing("flags"))?;
            Statement::Plug {
                path,
                value_type: ValueType::from_name(value_type)
                    .ok_or_else(|| format!("unknown value type \"{value_type}\""))?,
                direction: Direction::from_name(direction)
                    .ok_or_else(|| format!("unknown direction \"{direction}\""))?,
                flags: PlugFlags::from_names(flags)
                    .ok_or_else(|| format!("unknown flags \"{flags}\""))?,
                default: json(rest)?,
            }
        }
        "set" => {
            let (path, rest) = word(rest).ok_or_else(|| missing("plug path"))?;
            Statement::Set {
                path,
                value: json(rest)?,
            }
        }
        "connect" => {
            let (destination, rest) = word(rest).ok_or_else(|| missing("destination"))?;
            let (source, rest) = word(rest).ok_or_else(|| missing("source"))?;
            if !rest.trim().is_empty() {
                return Err(format!("unexpected \"{}\"", rest.trim()));
            }
            Statement::Connect {
                destination,
                source,
            }
        }
        other => return Err(format!("unknown statement \"{other}\"")),
    };
    Ok(Some(statement))
}

/// Maps script paths to the components created for them, which may have
/// been renamed to stay unique.
struct Resolver<'g> {
    graph: &'g Graph,
    parent: NodeId,
    created: HashMap<String, ComponentId>,
}

impl Resolver<'_> {
    fn resolve(&self, path: &str) -> Option<ComponentId> {
        if let Some(id) = self.created.get(path) {
            return Some(*id);
        }
        // Longest created prefix, then plain lookup below it.
        let mut split = path.len();
        while let Some(dot) = path[..split].rfind('.') {
            if let Some(id) = self.created.get(&path[..dot]) {
                return self.graph.descendant_of(*id, &path[dot + 1..]);
            }
            split = dot;
        }
        self.graph.descendant_of(self.parent, path)
    }

    /// The component a new child at `path` goes under, and its name.
    fn parent_of<'p>(&self, path: &'p str) -> std::result::Result<(ComponentId, &'p str), String> {
        match path.rsplit_once('.') {
            None => Ok((self.parent.component(), path)),
            Some((parent, name)) => self
                .resolve(parent)
                .map(|id| (id, name))
                .ok_or_else(|| format!("\"{parent}\" does not exist")),
        }
    }

    fn plug(&self, path: &str) -> std::result::Result<PlugId, String> {
        self.resolve(path)
            .filter(|id| self.graph.is_plug(*id))
            .map(PlugId)
            .ok_or_else(|| format!("plug \"{path}\" does not exist"))
    }
}

pub(super) fn execute(graph: &Graph, parent: NodeId, text: &str) -> Result<Vec<NodeId>> {
    graph.behaviour(parent)?;
    let mut resolver = Resolver {
        graph,
        parent,
        created: HashMap::new(),
    };
    let mut top_level = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let parse_error = |message: String| Error::Parse {
            line: number,
            message,
        };
        // Graph errors keep their kind; the line goes in the log.
        let located = |e: Error| {
            tracing::debug!(line = number, error = %e, "script statement failed");
            match e {
                Error::Json(message) => parse_error(message),
                e => e,
            }
        };

        let Some(statement) = parse_line(line).map_err(parse_error)? else {
            continue;
        };
        match statement {
            Statement::Node { type_name, path } => {
                let (owner, name) = resolver.parent_of(path).map_err(parse_error)?;
                if !graph.is_node(owner) {
                    return Err(parse_error(format!("\"{path}\" is not under a node")));
                }
                let node = graph
                    .create_node(NodeId(owner), type_name, name)
                    .map_err(located)?;
                resolver.created.insert(path.to_string(), node.component());
                if owner == parent.component() {
                    top_level.push(node);
                }
            }
            Statement::Plug {
                path,
                value_type,
                direction,
                flags,
                default,
            } => {
                let (owner, name) = resolver.parent_of(path).map_err(parse_error)?;
                let mut spec = PlugSpec::new(direction, value_type).with_flags(flags);
                if !default.is_null() {
                    spec = spec.with_default(Value::from_json(value_type, &default).map_err(located)?);
                }
                let plug = graph.add_plug(owner, name, spec).map_err(located)?;
                resolver.created.insert(path.to_string(), plug.component());
            }
            Statement::Set { path, value } => {
                let plug = resolver.plug(path).map_err(parse_error)?;
                let value_type = graph.value_type(plug)?;
                let value = Value::from_json(value_type, &value).map_err(located)?;
                graph.set_value(plug, value).map_err(located)?;
            }
            Statement::Connect {
                destination,
                source,
            } => {
                let destination = resolver.plug(destination).map_err(parse_error)?;
                match resolver.plug(source) {
                    Ok(source) => graph.set_input(destination, Some(source)).map_err(located)?,
                    Err(reason) => {
                        tracing::warn!(line = number, %reason, "skipping connection");
                    }
                }
            }
        }
    }

    Ok(top_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_each_statement() {
        assert_eq!(
            parse_line("node Add Box.Add1").unwrap(),
            Some(Statement::Node {
                type_name: "Add",
                path: "Box.Add1"
            })
        );
        assert_eq!(
            parse_line("plug A.user.x Float out dynamic,serialisable 2.5").unwrap(),
            Some(Statement::Plug {
                path: "A.user.x",
                value_type: ValueType::Float,
                direction: Direction::Out,
                flags: PlugFlags::DYNAMIC | PlugFlags::SERIALISABLE,
                default: json!(2.5),
            })
        );
        assert_eq!(
            parse_line("  set A.op1   [1, 2]  ").unwrap(),
            Some(Statement::Set {
                path: "A.op1",
                value: json!([1, 2]),
            })
        );
        assert_eq!(
            parse_line("connect B.op1 A.sum").unwrap(),
            Some(Statement::Connect {
                destination: "B.op1",
                source: "A.sum"
            })
        );
        assert_eq!(parse_line("# comment").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "frobnicate A",
            "node Add",
            "node Add A extra",
            "plug A.x Nope in none null",
            "plug A.x Int sideways none null",
            "plug A.x Int in shiny null",
            "set A.op1 {broken",
            "connect A.op1",
        ] {
            assert!(parse_line(line).is_err(), "{line}");
        }
    }

    #[test]
    fn errors_carry_line_numbers() {
        let graph = Graph::new();
        let err = execute(&graph, graph.root(), "# trellis script\nnode Add A\nset A.nope 1\n")
            .unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 3),
            e => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn unknown_types_are_not_parse_errors() {
        let graph = Graph::new();
        let err = execute(&graph, graph.root(), "node Teapot T\n").unwrap_err();
        assert!(matches!(err, Error::UnknownNodeType(t) if t == "Teapot"));
    }

    #[test]
    fn bad_values_report_the_line() {
        let graph = Graph::new();
        let err = execute(&graph, graph.root(), "node Add A\nset A.op1 \"text\"\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }
}
