use oxg_core::ir::{IrBuilder, PrimitiveKind, TypeKind};
use oxg_core::schema::SchemaKind;
use oxg_core::source::{Document, DocumentSource, MapResolver};
use oxg_core::{parse, Options};

const ROOT: &str = r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths: {}
components:
  schemas:
    Local:
      $ref: 'foo.json#/Remote'
"#;

const FOO: &str = r#"{ "Remote": { "$ref": "bar.json#/Actual" } }"#;
const BAR: &str = r#"{ "Actual": { "type": "integer" } }"#;

fn source() -> DocumentSource {
    let root = Document::parse("spec.yaml", ROOT).unwrap();
    let resolver = MapResolver::new()
        .insert("foo.json", FOO)
        .insert("bar.json", BAR);
    DocumentSource::new(root, Box::new(resolver))
}

#[test]
fn reference_chains_resolve_across_documents() {
    let options = Options::default();
    let (api, arena) = parse(&options, source()).unwrap();

    let id = api.schemas["Local"];
    let schema = &arena[id];
    assert_eq!(schema.kind, SchemaKind::Integer);
    assert_eq!(
        schema.ref_key.as_ref().unwrap().to_string(),
        "bar.json#/Actual"
    );

    let ir = IrBuilder::build(&options, &api, &arena).unwrap();
    let ty = ir.types.lookup_ref(schema.ref_key.as_ref().unwrap()).unwrap();
    match &ir.types[ty].kind {
        TypeKind::Primitive { kind, .. } => assert_eq!(*kind, PrimitiveKind::Int),
        other => panic!("expected integer primitive, got {other:?}"),
    }
}

#[test]
fn external_references_are_disabled_by_default() {
    let root = Document::parse("spec.yaml", ROOT).unwrap();
    let options = Options::default();
    let err = parse(&options, DocumentSource::local(root)).unwrap_err();
    assert!(
        err.to_string().contains("external references are disabled"),
        "{err}"
    );
}

#[test]
fn unresolvable_pointers_fail() {
    let root = Document::parse("spec.yaml", ROOT).unwrap();
    let resolver = MapResolver::new()
        .insert("foo.json", r#"{ "Remote": { "$ref": "bar.json#/Missing" } }"#)
        .insert("bar.json", BAR);
    let options = Options::default();
    let err = parse(&options, DocumentSource::new(root, Box::new(resolver))).unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}
