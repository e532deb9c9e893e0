//! Artifact rendering scopes and the schema registry file

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::{base_type, is_valid_name, Argument, ArtifactKind, Definition, Field, Schema};
use crate::signature::Signature;

/// Registry file inside every generated schema directory
pub const REGISTRY_FILE: &str = "__registry.json";

/// Extension of generated artifact files
pub const ARTIFACT_EXTENSION: &str = "graphql";

/// Marker files written into a fresh schema directory
pub const SENTINELS: [(&str, &str); 2] = [
    ("_manifest_exclude", ""),
    (".gitattributes", "* linguist-generated=true\n"),
];

/// Directive carrying an encoded resolver on a generated field
pub const RESOLVER_DIRECTIVE: &str = "resolver";

pub fn artifact_file(name: &str) -> String {
    format!("{}.{}", name, ARTIFACT_EXTENSION)
}

/// Signature over `{kind, definition}`
pub fn signature(definition: &Definition) -> Result<Signature> {
    Signature::of(&json!({
        "kind": definition.kind(),
        "definition": definition,
    }))
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub kind: ArtifactKind,
    pub file: String,
    pub signature: Signature,
}

/// `__registry.json`: every artifact of one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRegistry {
    pub schema: String,
    pub artifacts: BTreeMap<String, RegistryEntry>,
}

impl ArtifactRegistry {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, kind: ArtifactKind, signature: Signature) {
        self.artifacts.insert(
            name.to_string(),
            RegistryEntry {
                kind,
                file: artifact_file(name),
                signature,
            },
        );
    }

    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

// =============================================================================
// Scopes
// =============================================================================

/// Template scope for a definition; `schema` supplies the types input defaults refer to
pub fn scope(definition: &Definition, schema: &Schema) -> Result<Value> {
    let scope = match definition {
        Definition::Object(o) => json!({
            "name": o.name,
            "description": o.description.as_deref().map(block_string),
            "implements": (!o.interfaces.is_empty()).then(|| o.interfaces.join(" & ")),
            "fields": o.fields.values().map(output_field).collect::<Result<Vec<_>>>()?,
        }),
        Definition::Interface(i) => json!({
            "name": i.name,
            "description": i.description.as_deref().map(block_string),
            "fields": i.fields.values().map(|f| {
                json!({
                    "description": f.description.as_deref().map(block_string),
                    "line": field_signature(&f.name, &f.args, &f.type_ref),
                })
            }).collect::<Vec<_>>(),
        }),
        Definition::Input(i) => json!({
            "name": i.name,
            "description": i.description.as_deref().map(block_string),
            "fields": i.fields.values().map(|f| -> Result<Value> {
                let mut line = format!("{}: {}", f.name, f.type_ref);
                if let Some(default) = &f.default {
                    line.push_str(&format!(" = {}", graphql_literal(default, &f.type_ref, schema)?));
                }
                Ok(json!({
                    "description": f.description.as_deref().map(block_string),
                    "line": line,
                }))
            }).collect::<Result<Vec<_>>>()?,
        }),
        Definition::Union(u) => json!({
            "name": u.name,
            "description": u.description.as_deref().map(block_string),
            "members": u.members.join(" | "),
        }),
        Definition::Enum(e) => json!({
            "name": e.name,
            "description": e.description.as_deref().map(block_string),
            "values": e.values.iter().map(|v| json!({
                "name": v.name,
                "description": v.description.as_deref().map(block_string),
            })).collect::<Vec<_>>(),
        }),
        Definition::Scalar(s) => json!({
            "name": s.name,
            "description": s.description.as_deref().map(block_string),
        }),
    };
    Ok(scope)
}

fn output_field(field: &Field) -> Result<Value> {
    let mut line = field_signature(&field.name, &field.args, &field.type_ref);
    if let Some(resolver) = &field.resolver {
        let encoded = resolver.encode()?;
        line.push_str(&format!(
            " @{}(encoded: {})",
            RESOLVER_DIRECTIVE,
            serde_json::to_string(&encoded)?
        ));
    }
    Ok(json!({
        "description": field.description.as_deref().map(block_string),
        "line": line,
    }))
}

fn field_signature(name: &str, args: &[Argument], type_ref: &str) -> String {
    if args.is_empty() {
        return format!("{}: {}", name, type_ref);
    }
    let args = args
        .iter()
        .map(|a| format!("{}: {}", a.name, a.type_ref))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({}): {}", name, args, type_ref)
}

/// GraphQL value literal for `value` in a position of type `type_ref`
///
/// Strings become enum values when the type is an enum, objects follow the
/// field types of the input they fill.
fn graphql_literal(value: &Value, type_ref: &str, schema: &Schema) -> Result<String> {
    let base = base_type(type_ref);
    let literal = match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => match schema.get(base) {
            Some(Definition::Enum(_)) if is_valid_name(s) => s.clone(),
            _ => serde_json::to_string(s)?,
        },
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| graphql_literal(item, base, schema))
                .collect::<Result<Vec<_>>>()?;
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let fields = match schema.get(base) {
                Some(Definition::Input(input)) => Some(&input.fields),
                _ => None,
            };
            let entries = map
                .iter()
                .map(|(key, item)| -> Result<String> {
                    let field_type = fields
                        .and_then(|f| f.get(key))
                        .map_or("", |f| f.type_ref.as_str());
                    Ok(format!("{}: {}", key, graphql_literal(item, field_type, schema)?))
                })
                .collect::<Result<Vec<_>>>()?;
            format!("{{{}}}", entries.join(", "))
        }
    };
    Ok(literal)
}

/// Escape text for a `"""` block string
fn block_string(text: &str) -> String {
    text.replace("\"\"\"", "\\\"\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{EncodedResolver, ResolverRef};
    use crate::schema::{EnumType, InputField, InputType, ObjectType, UnionType};

    fn page() -> Definition {
        let mut page = ObjectType::new("Page");
        page.interfaces.push("Node".to_string());
        page.add_field(Field::new("id", "ID!"));
        page.add_field(
            Field::new("title", "String")
                .with_arg("lang", "String")
                .with_resolver(EncodedResolver::new(ResolverRef::new("Builtin", "resolve"))),
        );
        Definition::Object(page)
    }

    #[test]
    fn test_object_scope_lines() {
        let scope = scope(&page(), &Schema::new("default")).unwrap();
        assert_eq!(scope["implements"], "Node");
        assert_eq!(scope["fields"][0]["line"], "id: ID!");
        assert_eq!(
            scope["fields"][1]["line"],
            r#"title(lang: String): String @resolver(encoded: "{\"ref\":\"Builtin::resolve\"}")"#
        );
    }

    #[test]
    fn test_input_defaults_are_graphql_literals() {
        let mut schema = Schema::new("default");
        schema
            .add(Definition::Enum(EnumType {
                name: "Status".to_string(),
                description: None,
                values: vec![],
            }))
            .unwrap();
        let range = InputType {
            name: "Range".to_string(),
            description: None,
            fields: BTreeMap::from([(
                "from".to_string(),
                InputField {
                    name: "from".to_string(),
                    type_ref: "Int".to_string(),
                    description: None,
                    default: None,
                },
            )]),
        };
        schema.add(Definition::Input(range)).unwrap();

        let field = |name: &str, type_ref: &str, default: Value| InputField {
            name: name.to_string(),
            type_ref: type_ref.to_string(),
            description: None,
            default: Some(default),
        };
        let filter = Definition::Input(InputType {
            name: "PageFilter".to_string(),
            description: None,
            fields: BTreeMap::from([
                ("a_status".to_string(), field("status", "Status!", json!("DRAFT"))),
                ("b_tags".to_string(), field("tags", "[Status!]", json!(["DRAFT", "LIVE"]))),
                ("c_title".to_string(), field("title", "String", json!("say \"hi\""))),
                ("d_range".to_string(), field("range", "Range", json!({"from": 1, "to": null}))),
                ("e_flag".to_string(), field("flag", "Boolean", json!(true))),
            ]),
        });

        let scope = scope(&filter, &schema).unwrap();
        let lines: Vec<&str> = scope["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["line"].as_str().unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                "status: Status! = DRAFT",
                "tags: [Status!] = [DRAFT, LIVE]",
                r#"title: String = "say \"hi\"""#,
                "range: Range = {from: 1, to: null}",
                "flag: Boolean = true",
            ]
        );
    }

    #[test]
    fn test_union_members() {
        let union = Definition::Union(UnionType {
            name: "SearchResult".to_string(),
            description: None,
            members: vec!["Page".to_string(), "Member".to_string()],
        });
        assert_eq!(scope(&union, &Schema::new("default")).unwrap()["members"], "Page | Member");
    }

    #[test]
    fn test_signature_tracks_definition() {
        let a = signature(&page()).unwrap();
        assert_eq!(a, signature(&page()).unwrap());

        let Definition::Object(mut changed) = page() else {
            unreachable!()
        };
        changed.add_field(Field::new("body", "String"));
        assert_ne!(a, signature(&Definition::Object(changed)).unwrap());
    }

    #[test]
    fn test_registry_json_shape() {
        let mut registry = ArtifactRegistry::new("default");
        registry.insert("Page", ArtifactKind::Type, signature(&page()).unwrap());
        let value: Value = serde_json::from_str(&registry.to_json().unwrap()).unwrap();
        assert_eq!(value["schema"], "default");
        assert_eq!(value["artifacts"]["Page"]["kind"], "type");
        assert_eq!(value["artifacts"]["Page"]["file"], "Page.graphql");
    }
}
