use oxg_core::ir::{NilSemantic, PrimitiveKind, TypeKind};
use oxg_core::{compile_str, Options};

const PETSTORE: &str = include_str!("fixtures/petstore.yaml");
const RECURSIVE: &str = include_str!("fixtures/recursive.yaml");
const POLYMORPHIC: &str = include_str!("fixtures/polymorphic.yaml");

#[test]
fn petstore_end_to_end() {
    let options = Options::default();
    let ir = compile_str(&options, "petstore.yaml", PETSTORE).unwrap();

    assert_eq!(ir.operations.len(), 2);
    assert_eq!(ir.operations[0].name.original, "listPets");
    assert_eq!(ir.operations[1].name.original, "getPet");

    let pet = ir.types.lookup_name("Pet").expect("Pet type");
    let fields = match &ir.types[pet].kind {
        TypeKind::Struct { fields } => fields,
        other => panic!("expected struct, got {other:?}"),
    };
    assert_eq!(fields.len(), 3);
    assert!(fields.iter().all(|f| !f.json_name.is_empty()));

    // optional string field wraps in the shared OptString generic
    let tag = fields.iter().find(|f| f.json_name == "tag").unwrap();
    match &ir.types[tag.ty].kind {
        TypeKind::Generic { inner, .. } => match &ir.types[*inner].kind {
            TypeKind::Primitive { kind, .. } => assert_eq!(*kind, PrimitiveKind::String),
            other => panic!("expected string inner, got {other:?}"),
        },
        other => panic!("expected generic wrapper, got {other:?}"),
    }

    // router terminals
    assert_eq!(ir.router.find("GET", "/pets"), Some(("listPets", vec![])));
    assert_eq!(
        ir.router.find("GET", "/pets/7"),
        Some(("getPet", vec!["7"]))
    );
    assert_eq!(ir.router.find("DELETE", "/pets"), None);
}

#[test]
fn component_references_share_one_type() {
    let options = Options::default();
    let ir = compile_str(&options, "petstore.yaml", PETSTORE).unwrap();

    let pet = ir.types.lookup_name("Pet").unwrap();
    // both operations respond with Pet; the array item and the direct
    // response resolve to the same handle
    let list = &ir.operations[0];
    let get = &ir.operations[1];

    let list_ty = list.responses.values().next().unwrap().ty.unwrap();
    let item = match &ir.types[list_ty].kind {
        TypeKind::Array { item } => *item,
        other => panic!("expected array response, got {other:?}"),
    };
    assert_eq!(item, pet);

    let get_ty = get.responses.values().next().unwrap().ty.unwrap();
    assert_eq!(get_ty, pet);
}

#[test]
fn recursion_breaks_with_pointers() {
    let options = Options::default();
    let ir = compile_str(&options, "recursive.yaml", RECURSIVE).unwrap();

    let pet = ir.types.lookup_name("Pet").unwrap();
    let fields = match &ir.types[pet].kind {
        TypeKind::Struct { fields } => fields,
        other => panic!("expected struct, got {other:?}"),
    };
    let friends = fields.iter().find(|f| f.json_name == "friends").unwrap();
    let item = match &ir.types[friends.ty].kind {
        TypeKind::Array { item } => *item,
        other => panic!("expected array, got {other:?}"),
    };
    match &ir.types[item].kind {
        TypeKind::Pointer { to, semantic } => {
            assert_eq!(*to, pet);
            assert_eq!(*semantic, NilSemantic::Invalid);
        }
        other => panic!("expected pointer, got {other:?}"),
    }
}

#[test]
fn discriminator_mapping_is_completed() {
    let options = Options::default();
    let ir = compile_str(&options, "polymorphic.yaml", POLYMORPHIC).unwrap();

    let pet = ir.types.lookup_name("Pet").unwrap();
    let (variants, discriminator) = match &ir.types[pet].kind {
        TypeKind::Sum {
            variants,
            discriminator,
        } => (variants, discriminator.as_ref().unwrap()),
        other => panic!("expected sum, got {other:?}"),
    };
    assert_eq!(variants.len(), 3);
    assert_eq!(discriminator.property, "petType");

    let keys: Vec<&str> = discriminator.mapping.keys().map(String::as_str).collect();
    assert!(keys.contains(&"cat"));
    assert!(keys.contains(&"dog"));
    assert!(keys.contains(&"cow"));

    let cat = ir.types.lookup_name("Cat").unwrap();
    let dog = ir.types.lookup_name("Dog").unwrap();
    let cow = ir.types.lookup_name("Cow").unwrap();
    assert_eq!(discriminator.mapping["cat"], cat);
    assert_eq!(discriminator.mapping["dog"], dog);
    assert_eq!(discriminator.mapping["cow"], cow);
}

#[test]
fn duplicate_enum_values_fail() {
    let options = Options::default();
    let err = compile_str(
        &options,
        "spec.yaml",
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths: {}
components:
  schemas:
    Color:
      type: string
      enum: [red, green, red]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate enum value"), "{err}");
}

#[test]
fn multi_content_request_becomes_interface() {
    let options = Options::default();
    let ir = compile_str(
        &options,
        "spec.yaml",
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /things:
    post:
      operationId: createThing
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Thing'
          text/plain:
            schema:
              type: string
      responses:
        '204':
          description: accepted
components:
  schemas:
    Thing:
      type: object
      properties:
        name:
          type: string
"#,
    )
    .unwrap();

    let request = ir.operations[0].request.as_ref().unwrap();
    assert!(ir.types[request.ty].is_interface());
    assert_eq!(request.contents.len(), 2);

    // every member carries the marker
    for &member in request.contents.values() {
        assert!(ir.types[member].implements.contains(&request.ty));
    }
    let names: Vec<&str> = ir.interfaces().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["CreateThingReq"]);

    // empty 204 devirtualizes to no type at all
    let response = ir.operations[0].responses.values().next().unwrap();
    assert!(response.ty.is_none());
}

#[test]
fn distinct_response_bodies_union_into_an_interface() {
    let options = Options::default();
    let ir = compile_str(
        &options,
        "spec.yaml",
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
          required: true
          schema: { type: string }
      responses:
        '200':
          description: a pet
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pet'
        default:
          description: an error
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Error'
components:
  schemas:
    Pet:
      type: object
      properties:
        name: { type: string }
    Error:
      type: object
      properties:
        message: { type: string }
"#,
    )
    .unwrap();

    let op = &ir.operations[0];
    let union = op.response_ty.expect("combined response type");
    assert!(ir.types[union].is_interface());

    let pet = ir.types.lookup_name("Pet").unwrap();
    let error = ir.types.lookup_name("Error").unwrap();
    assert!(ir.types[pet].implements.contains(&union));
    assert!(ir.types[error].implements.contains(&union));
    let names: Vec<&str> = ir.interfaces().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["GetPetRes"]);
}

#[test]
fn single_body_response_devirtualizes() {
    let options = Options::default();
    let ir = compile_str(&options, "petstore.yaml", PETSTORE).unwrap();

    // getPet: 200 carries Pet, default is bodiless; no interface is built
    let pet = ir.types.lookup_name("Pet").unwrap();
    assert_eq!(ir.operations[1].response_ty, Some(pet));
    assert_eq!(ir.interfaces().count(), 0);
}

#[test]
fn optional_fields_of_separate_schemas_share_a_wrapper() {
    let options = Options::default();
    let ir = compile_str(
        &options,
        "spec.yaml",
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths: {}
components:
  schemas:
    A:
      type: object
      properties:
        a: { type: string }
    B:
      type: object
      properties:
        b: { type: string }
"#,
    )
    .unwrap();

    let field = |name: &str, json: &str| {
        let ty = ir.types.lookup_name(name).unwrap();
        match &ir.types[ty].kind {
            TypeKind::Struct { fields } => {
                fields.iter().find(|f| f.json_name == json).unwrap().ty
            }
            other => panic!("expected struct, got {other:?}"),
        }
    };
    assert_eq!(field("A", "a"), field("B", "b"));
    assert_eq!(
        ir.types.lookup_name("OptString"),
        Some(field("A", "a"))
    );
}

#[test]
fn percent_encoded_paths_stay_distinct() {
    let options = Options::default();
    let ir = compile_str(
        &options,
        "spec.yaml",
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /user/get:
    get:
      operationId: userGet
      responses:
        '204': { description: ok }
  /user%2Fget:
    get:
      operationId: userSlashGet
      responses:
        '204': { description: ok }
"#,
    )
    .unwrap();

    assert_eq!(ir.operations.len(), 2);
    assert_eq!(ir.router.find("GET", "/user/get"), Some(("userGet", vec![])));
    assert_eq!(
        ir.router.find("GET", "/user%2Fget"),
        Some(("userSlashGet", vec![]))
    );
}

#[test]
fn not_implemented_downgrade_skips_the_operation() {
    let spec = r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /search:
    get:
      operationId: search
      parameters:
        - name: filter
          in: query
          schema:
            type: object
            properties:
              q: { type: string }
      responses:
        '204': { description: ok }
  /ping:
    get:
      operationId: ping
      responses:
        '204': { description: ok }
"#;
    let strict = Options::default();
    let err = compile_str(&strict, "spec.yaml", spec).unwrap_err();
    assert_eq!(err.not_implemented_reason(), Some("complex parameter types"));

    let lenient = Options {
        ignore_not_implemented: vec!["complex parameter types".to_string()],
        ..Options::default()
    };
    let ir = compile_str(&lenient, "spec.yaml", spec).unwrap();
    assert_eq!(ir.operations.len(), 1);
    assert_eq!(ir.operations[0].name.original, "ping");
    assert_eq!(ir.router.find("GET", "/search"), None);
}
