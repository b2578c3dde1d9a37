use json_schemata::ir::Ty;
use json_schemata::prelude::*;
use serde_json::json;

const SEMVER: &str = r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";

fn package_json() -> SchemaBuilder {
    let mut b = SchemaBuilder::new();
    b.add_definition("semver", Schema::regex(SEMVER, StringOptions::new().title("Semver")))
        .unwrap()
        .add_definition(
            "_npmPackageName",
            Schema::string(StringOptions::new().min_length(1).max_length(214).pattern(r"^[a-z0-9@/._\-~]+$")),
        )
        .unwrap()
        .add_generated("npmPackageFileContent", |b| {
            Schema::object(
                [("name", b.def_ref("_npmPackageName")), ("version", b.def_ref("semver"))],
                ObjectOptions::new(),
            )
        })
        .unwrap()
        .set_root("npmPackageFileContent")
        .unwrap();
    b
}

fn version_store() -> SchemaBuilder {
    let mut b = SchemaBuilder::new();
    b.add_definition(
        "_versionStoreJson",
        Schema::object(
            [
                ("path", Property::required(Schema::regex(r"\.json[c5]?$", StringOptions::new()))),
                ("field", Schema::optional(Schema::string(StringOptions::new()))),
            ],
            ObjectOptions::new(),
        )
        .unwrap(),
    )
    .unwrap()
    .add_definition(
        "_versionStoreFile",
        Schema::object(
            [
                ("path", Property::required(Schema::string(StringOptions::new()))),
                (
                    "replace",
                    Schema::optional(
                        Schema::object(
                            [
                                ("match", Schema::optional(Schema::string(StringOptions::new().format("regex")))),
                                ("with", Schema::optional(Schema::regex(r"\{\{version\}\}", StringOptions::new()))),
                            ],
                            ObjectOptions::new(),
                        )
                        .unwrap(),
                    ),
                ),
            ],
            ObjectOptions::new(),
        )
        .unwrap(),
    )
    .unwrap()
    .add_generated("versionStore", |b| {
        Ok(Schema::union([b.def_ref("_versionStoreJson"), b.def_ref("_versionStoreFile")]))
    })
    .unwrap()
    .set_root("versionStore")
    .unwrap();
    b
}

fn config() -> SchemaBuilder {
    let stores = version_store();
    let package = package_json();
    let store_root = stores.root_schema().unwrap();
    let package_root = package.root_schema().unwrap();

    let mut config = SchemaBuilder::with_library(&stores);
    config
        .add_definitions(&package)
        .unwrap()
        .add_definition(
            "bscotchVersioning",
            Schema::object(
                [(
                    "stores",
                    Schema::optional(Schema::union([
                        store_root.clone(),
                        Schema::array(store_root, ArrayOptions::new()),
                    ])),
                )],
                ObjectOptions::new(),
            )
            .unwrap(),
        )
        .unwrap()
        .add_generated("bscotchConfig", |b| {
            Ok(Schema::intersect([
                package_root,
                Schema::object(
                    [(
                        "bscotch",
                        Schema::optional(Schema::object(
                            [("versioning", Schema::optional(b.def_ref("bscotchVersioning")))],
                            ObjectOptions::new(),
                        )?),
                    )],
                    ObjectOptions::new(),
                )?,
            ]))
        })
        .unwrap()
        .set_root("bscotchConfig")
        .unwrap();
    config
}

#[test]
fn accepts_realistic_configs() {
    let config = config();
    for doc in [
        json!({"name": "repo", "version": "1.0.0"}),
        json!({"name": "repo", "version": "1.0.0", "bscotch": {}}),
        json!({"name": "repo", "version": "1.0.0", "bscotch": {"versioning": {"stores": {"path": "a.json"}}}}),
        json!({"name": "repo", "version": "1.0.0-beta.2", "bscotch": {"versioning": {"stores": [
            {"path": "package.json5", "field": "version"},
            {"path": "VERSION", "replace": {"match": "^v.*$", "with": "v{{version}}"}}
        ]}}}),
    ] {
        assert!(config.is_valid(&doc).unwrap(), "{doc} => {:?}", config.last_errors());
    }
}

#[test]
fn rejects_with_located_diagnostics() {
    let config = config();

    assert!(!config.is_valid(&json!({"name": "repo"})).unwrap());
    let errors = config.last_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path.to_string(), "version");
    assert_eq!(errors[0].keyword, "required");

    let doc = json!({"name": "repo", "version": "1.0.0", "bscotch": {"versioning": {"stores": [{"path": 12}]}}});
    assert!(!config.is_valid(&doc).unwrap());
    let errors = config.last_errors();
    assert_eq!(errors[0].keyword, "anyOf");
    assert_eq!(errors[0].path.to_string(), "bscotch.versioning.stores");
    assert!(errors.iter().any(|d| d.path.to_string() == "bscotch.versioning.stores[0].path" && d.keyword == "type"));

    let doc = json!({"name": "repo", "version": "1.0.0", "bscotch": {"versioning": {"stores": {"path": "V", "replace": {"match": "(unclosed"}}}}});
    assert!(!config.is_valid(&doc).unwrap());
    assert!(config.last_errors().iter().any(|d| d.keyword == "format"));
}

#[test]
fn serialized_document_validates_the_same() {
    let config = config();
    let doc = config.serialize_with_defs(Target::Root).unwrap();
    assert_eq!(doc["allOf"][0], json!({"$ref": "#/$defs/npmPackageFileContent"}));
    assert!(doc["$defs"].get("versionStore").is_some());

    let reloaded = SchemaBuilder::from_document(&doc).unwrap();
    assert_eq!(reloaded.root(), Some(&Root::Definition("bscotchConfig".into())));
    for data in [
        json!({"name": "repo", "version": "1.0.0"}),
        json!({"name": "repo"}),
        json!({"name": "repo", "version": "1.0.0", "bscotch": {"versioning": {"stores": 5}}}),
    ] {
        assert_eq!(config.is_valid(&data).unwrap(), reloaded.is_valid(&data).unwrap());
        assert_eq!(config.last_errors(), reloaded.last_errors());
    }
}

#[test]
fn reflected_config_merges_intersection() {
    let reflection = config().reflect(Target::Root).unwrap();
    let Ty::Object { fields, .. } = &reflection.root else {
        panic!("expected an object, got {:?}", reflection.root)
    };
    let names: Vec<(&str, bool)> = fields.iter().map(|f| (f.name.as_str(), f.required)).collect();
    assert_eq!(names, vec![("name", true), ("version", true), ("bscotch", false)]);
    assert_eq!(reflection.root.field("version").unwrap().ty, Ty::Named("semver".into()));
    assert!(reflection.definitions.contains_key("versionStore"));
}

#[test]
fn library_changes_do_not_leak_into_config() {
    let mut stores = version_store();
    let config = SchemaBuilder::with_library(&stores);
    stores.add_definition("_versionStoreToml", Schema::boolean()).unwrap();
    assert!(!config.has_definition("_versionStoreToml"));
    assert!(config.has_definition("versionStore"));
}
