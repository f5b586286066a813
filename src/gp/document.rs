//! Tree documents: a tree's signature and text body stored as TOML.
//!
//! ```toml
//! [tree]
//! name = "Fact[int]"
//! return_type = "int"
//! arguments = ["int"]
//! local_variables = []
//! tree_entity = """
//! +--If<int>
//! ...
//! """
//! ```

use super::catalog::NodeCatalog;
use super::subroutine::{SubroutineRegistry, SubroutineSignature};
use super::text;
use super::tree::{Signature, Tree};
use super::types::{Type, TypeCatalog};
use crate::error::{Error, Errors, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize, Serialize)]
struct DocumentFile {
    tree: Option<TreeTable>,
}

// Every field is optional here so that missing fields are reported together.
#[derive(Debug, Default, Deserialize, Serialize)]
struct TreeTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    local_variables: Vec<String>,
    #[serde(default)]
    tree_entity: Option<String>,
}

/// Read the tree described by the document `text` without registering it.
pub fn read_document(
    text: &str,
    catalog: &NodeCatalog,
    registry: &SubroutineRegistry,
) -> Result<Tree> {
    let (signature, body) = parse(text, catalog.types())?;
    text::read_tree(&body, signature, catalog, registry)
}

/// Read the document `text` and register its tree as a subroutine under its name.
///
/// The name is reserved before the body is read so that the body may call itself. A
/// document that fails to load leaves `registry` as it was.
pub fn load_document(
    text: &str,
    catalog: &NodeCatalog,
    registry: &mut SubroutineRegistry,
) -> Result<Arc<SubroutineSignature>> {
    let (signature, body) = parse(text, catalog.types())?;
    let subroutine = signature.subroutine().ok_or(Error::MissingName)?;
    let reserved = registry.reserve(subroutine)?;
    debug!(name = %reserved.name, "reserved subroutine");

    match text::read_tree(&body, signature, catalog, registry) {
        Ok(tree) => {
            registry.commit(&reserved.name, tree);
            debug!(name = %reserved.name, "committed subroutine");
            Ok(reserved)
        }
        Err(err) => {
            registry.rollback(&reserved.name);
            warn!(name = %reserved.name, error = %err, "rolled back subroutine");
            Err(err)
        }
    }
}

/// The document form of `tree`, which must be named.
pub fn write_document(tree: &Tree, types: &TypeCatalog) -> Result<String> {
    let name = tree.name().ok_or(Error::MissingName)?;
    let signature = tree.signature();
    let names = |list: &[Type]| -> Result<Vec<String>> {
        list.iter()
            .map(|&ty| types.name(ty).map(str::to_string))
            .collect()
    };
    let table = TreeTable {
        name: Some(name.to_string()),
        return_type: Some(types.name(signature.return_type)?.to_string()),
        arguments: names(&signature.arguments)?,
        local_variables: names(&signature.local_variables)?,
        tree_entity: Some(text::write_tree(tree, types)?),
    };
    let file = DocumentFile { tree: Some(table) };
    Ok(toml::to_string(&file)?)
}

/// `read_document` over a stream.
pub fn read_document_from<R: Read>(
    mut reader: R,
    catalog: &NodeCatalog,
    registry: &SubroutineRegistry,
) -> Result<Tree> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    read_document(&text, catalog, registry)
}

/// `load_document` over a stream.
pub fn load_document_from<R: Read>(
    mut reader: R,
    catalog: &NodeCatalog,
    registry: &mut SubroutineRegistry,
) -> Result<Arc<SubroutineSignature>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    load_document(&text, catalog, registry)
}

/// `write_document` into a stream.
pub fn write_document_to<W: Write>(mut writer: W, tree: &Tree, types: &TypeCatalog) -> Result<()> {
    let text = write_document(tree, types)?;
    writer.write_all(text.as_bytes())?;
    Ok(())
}

// The signature and body of a document. Field errors are collected before the body is
// looked at.
fn parse(text: &str, types: &TypeCatalog) -> Result<(Signature, String)> {
    let file: DocumentFile = toml::from_str(text)?;
    let table = file
        .tree
        .ok_or_else(|| Error::Document(vec!["missing `[tree]` table".to_string()]))?;
    let mut errors = Errors::new();

    let return_type = match table.return_type {
        Some(ref name) => errors.check(types.lookup(name)),
        None => {
            errors.push("missing field `return_type`");
            None
        }
    };
    if let Some(ty) = return_type {
        if ty.is_qualified() || ty.is_any() {
            errors.push(format!("return type `{}` must be a plain value type", ty));
        }
    }
    let arguments = concrete_types(&table.arguments, "argument", types, &mut errors);
    let local_variables =
        concrete_types(&table.local_variables, "local variable", types, &mut errors);
    if table.tree_entity.is_none() {
        errors.push("missing field `tree_entity`");
    }
    errors.finish()?;

    let signature = Signature {
        name: table.name,
        return_type: return_type.unwrap_or(Type::ANY),
        arguments,
        local_variables,
    };
    Ok((signature, table.tree_entity.unwrap_or_default()))
}

fn concrete_types(
    names: &[String],
    what: &str,
    types: &TypeCatalog,
    errors: &mut Errors,
) -> Vec<Type> {
    let mut list = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if let Some(ty) = errors.check(types.lookup(name)) {
            if ty.is_any() {
                errors.push(format!("{} {} must have a concrete type", what, i));
            }
            list.push(ty);
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::gp::context::EvaluationStatus;
    use crate::gp::value::{Value, Variable};
    use pretty_assertions::assert_eq;

    const FACT: &str = r#"
[tree]
name = "Fact[int]"
return_type = "int"
arguments = ["int"]
local_variables = []
tree_entity = """
+--If<int>
   |
   +--Greater<int>
   |  |
   |  +--Argument<int,0>
   |  |
   |  +--Const<int,1>
   |
   +--Mult<int>
   |  |
   |  +--Argument<int,0>
   |  |
   |  +--Fact[int]
   |     |
   |     +--Sub<int>
   |        |
   |        +--Argument<int,0>
   |        |
   |        +--Const<int,1>
   |
   +--Const<int,1>
"""
"#;

    fn catalog() -> NodeCatalog {
        NodeCatalog::standard(TypeCatalog::standard(), &[], &[]).unwrap()
    }

    #[test]
    fn recursive_documents_load() {
        crate::test_utils::init_test_logging();
        let catalog = catalog();
        let mut registry = SubroutineRegistry::new();
        let sig = load_document(FACT, &catalog, &mut registry).unwrap();
        assert_eq!(sig.name, "Fact[int]");
        let fact = registry.body("Fact[int]").unwrap();
        let config = EvaluationConfig::default();
        let outcome = fact.evaluate(vec![Variable::new(5)], &registry, &config);
        assert_eq!(outcome.status, EvaluationStatus::ValueReturned);
        assert_eq!(outcome.value, Some(Value::Int(120)));
    }

    #[test]
    fn documents_round_trip() {
        let catalog = catalog();
        let mut registry = SubroutineRegistry::new();
        load_document(FACT, &catalog, &mut registry).unwrap();
        let fact = registry.body("Fact[int]").unwrap();
        let written = write_document(fact, catalog.types()).unwrap();
        let reread = read_document(&written, &catalog, &registry).unwrap();
        assert_eq!(reread.signature(), fact.signature());
        assert_eq!(
            text::write_tree(&reread, catalog.types()).unwrap(),
            text::write_tree(fact, catalog.types()).unwrap()
        );
    }

    #[test]
    fn failed_loads_roll_back() {
        let catalog = catalog();
        let mut registry = SubroutineRegistry::new();
        let broken = FACT.replace("+--Const<int,1>\n\"\"\"", "+--Frob<int>\n\"\"\"");
        assert!(matches!(
            load_document(&broken, &catalog, &mut registry),
            Err(Error::UnknownNode(_))
        ));
        assert!(!registry.contains("Fact[int]"));
        // The name is free again.
        load_document(FACT, &catalog, &mut registry).unwrap();
        assert!(matches!(
            load_document(FACT, &catalog, &mut registry),
            Err(Error::DuplicateSubroutine(_))
        ));
    }

    #[test]
    fn field_errors_are_aggregated() {
        let text = r#"
[tree]
name = "Bad"
return_type = "integer"
arguments = ["int", "strng"]
"#;
        match read_document(text, &catalog(), &SubroutineRegistry::new()) {
            Err(Error::Document(messages)) => {
                assert_eq!(messages.len(), 3);
                assert!(messages[0].contains("integer"));
                assert!(messages[1].contains("strng"));
                assert!(messages[2].contains("tree_entity"));
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unnamed_trees_cannot_be_written_or_loaded() {
        let text = "[tree]\nreturn_type = \"int\"\ntree_entity = \"+--Const<int,3>\"\n";
        let catalog = catalog();
        let mut registry = SubroutineRegistry::new();
        let tree = read_document(text, &catalog, &registry).unwrap();
        assert!(matches!(write_document(&tree, catalog.types()), Err(Error::MissingName)));
        assert!(matches!(
            load_document(text, &catalog, &mut registry),
            Err(Error::MissingName)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn streams() {
        let catalog = catalog();
        let mut registry = SubroutineRegistry::new();
        load_document_from(FACT.as_bytes(), &catalog, &mut registry).unwrap();
        let mut out = Vec::new();
        write_document_to(&mut out, registry.body("Fact[int]").unwrap(), catalog.types()).unwrap();
        let tree = read_document_from(&out[..], &catalog, &registry).unwrap();
        assert_eq!(tree.name(), Some("Fact[int]"));
    }
}
