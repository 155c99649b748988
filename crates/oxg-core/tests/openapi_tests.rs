use pretty_assertions::assert_eq;

use oxg_core::openapi::{ParameterLocation, PathSegment, StatusKey, Style};
use oxg_core::source::{Document, DocumentSource};
use oxg_core::{parse, Options};

const PETSTORE: &str = include_str!("fixtures/petstore.yaml");

fn parse_yaml(text: &str) -> Result<oxg_core::Api, oxg_core::Error> {
    let document = Document::parse("spec.yaml", text)?;
    let options = Options::default();
    parse(&options, DocumentSource::local(document)).map(|(api, _)| api)
}

#[test]
fn petstore_document_shape() {
    let api = parse_yaml(PETSTORE).unwrap();

    assert_eq!(api.info.title, "Petstore");
    assert_eq!(api.operations.len(), 2);
    assert_eq!(api.schemas.len(), 1);

    // server template with its declared variable
    assert_eq!(api.servers.len(), 1);
    assert!(api.servers[0]
        .segments
        .iter()
        .any(|s| *s == PathSegment::Param("region".to_string())));

    // path-item parameter is inherited by the operation
    let get_pet = api.operations.iter().find(|o| o.name == "getPet").unwrap();
    let pet_id = get_pet
        .parameters_in(ParameterLocation::Path)
        .next()
        .expect("petId parameter");
    assert_eq!(pet_id.name, "petId");
    assert!(pet_id.required);
    assert_eq!(pet_id.style, Style::Simple);
    assert!(!pet_id.explode);

    // query parameter defaults
    let list = api.operations.iter().find(|o| o.name == "listPets").unwrap();
    let limit = list
        .parameters_in(ParameterLocation::Query)
        .next()
        .expect("limit parameter");
    assert_eq!(limit.style, Style::Form);
    assert!(limit.explode);

    // status buckets
    assert!(get_pet.responses.contains_key(&StatusKey::Code(200)));
    assert!(get_pet.responses.contains_key(&StatusKey::Default));
}

#[test]
fn operation_parameters_shadow_path_item_parameters() {
    let api = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /pets:
    parameters:
      - name: limit
        in: query
        schema: { type: integer }
      - name: verbose
        in: query
        schema: { type: boolean }
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          required: true
          schema: { type: string }
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap();

    let op = &api.operations[0];
    let limits: Vec<_> = op.parameters.iter().filter(|p| p.name == "limit").collect();
    assert_eq!(limits.len(), 1);
    assert!(limits[0].required, "operation-level definition wins");
    assert_eq!(op.parameters.len(), 2);
}

#[test]
fn path_template_splits_literal_runs() {
    let api = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /foo.{bar}.{baz}abc/def:
    get:
      operationId: fooOp
      parameters:
        - { name: bar, in: path, required: true, schema: { type: string } }
        - { name: baz, in: path, required: true, schema: { type: string } }
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap();

    let path = &api.operations[0].path;
    assert_eq!(
        path.segments,
        vec![
            PathSegment::Literal("/foo.".to_string()),
            PathSegment::Param("bar".to_string()),
            PathSegment::Literal(".".to_string()),
            PathSegment::Param("baz".to_string()),
            PathSegment::Literal("abc/def".to_string()),
        ]
    );
    assert_eq!(path.render(), "/foo.{bar}.{baz}abc/def");
}

#[test]
fn duplicate_operation_ids_are_fatal() {
    let err = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /a:
    get:
      operationId: same
      responses:
        '204': { description: ok }
  /b:
    get:
      operationId: same
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate operationId"), "{err}");
}

#[test]
fn webhooks_are_gated_on_3_1() {
    let spec = |version: &str| {
        format!(
            r#"
openapi: {version}
info: {{ title: t, version: "1" }}
paths: {{}}
webhooks:
  newPet:
    post:
      operationId: onNewPet
      responses:
        '204': {{ description: ok }}
"#
        )
    };

    let err = parse_yaml(&spec("3.0.3")).unwrap_err();
    assert!(
        err.to_string()
            .contains("webhooks requires OpenAPI 3.1, document declares 3.0.3"),
        "{err}"
    );

    let api = parse_yaml(&spec("3.1.0")).unwrap();
    assert_eq!(api.webhooks.len(), 1);
    assert_eq!(api.webhooks["newPet"][0].name, "onNewPet");
}

#[test]
fn bad_status_keys_are_rejected() {
    let err = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /a:
    get:
      operationId: a
      responses:
        '6XX': { description: nope }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown status code key"), "{err}");
}

#[test]
fn path_parameters_must_be_required() {
    let err = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      parameters:
        - name: petId
          in: path
          schema: { type: integer }
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("must be required"), "{err}");
}

#[test]
fn unknown_parameter_location_is_fatal() {
    let err = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /a:
    get:
      operationId: a
      parameters:
        - name: payload
          in: body
          schema: { type: string }
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown parameter location"), "{err}");
}

#[test]
fn undeclared_path_parameter_is_fatal() {
    let err = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("is not declared"), "{err}");
}

#[test]
fn security_requirements_resolve_against_declared_schemes() {
    let base = r#"
openapi: 3.0.3
info: { title: t, version: "1" }
security:
  - oauth: [read]
paths:
  /a:
    get:
      operationId: a
      responses:
        '204': { description: ok }
components:
  securitySchemes:
    oauth:
      type: oauth2
      flows:
        clientCredentials:
          tokenUrl: https://example.com/token
          scopes:
            read: read access
"#;
    let api = parse_yaml(base).unwrap();
    assert_eq!(api.operations[0].security.len(), 1);
    assert_eq!(api.operations[0].security[0].schemes["oauth"], vec!["read"]);

    let err = parse_yaml(&base.replace("- oauth: [read]", "- oauth: [write]")).unwrap_err();
    assert!(err.to_string().contains("not defined by scheme"), "{err}");

    let err = parse_yaml(&base.replace("- oauth: [read]", "- basic: []")).unwrap_err();
    assert!(err.to_string().contains("unknown security scheme"), "{err}");
}

#[test]
fn parameter_requires_schema_xor_content() {
    let err = parse_yaml(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /a:
    get:
      operationId: a
      parameters:
        - name: q
          in: query
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap_err();
    assert!(
        err.to_string().contains("either schema or content"),
        "{err}"
    );
}

#[test]
fn json_errors_carry_line_positions() {
    let text = r#"{
  "openapi": "3.0.3",
  "info": { "title": "t", "version": "1" },
  "paths": {
    "/a": {
      "get": {
        "operationId": "a",
        "responses": { "bogus": { "description": "x" } }
      }
    }
  }
}"#;
    let document = Document::parse("spec.json", text).unwrap();
    let options = Options::default();
    let err = parse(&options, DocumentSource::local(document)).unwrap_err();
    let location = err.location().expect("located error");
    assert_eq!(location.file, "spec.json");
    assert!(location.position.is_some());
}
