//! Real-world schema libraries: semver, package.json, version stores and a
//! repo config that stitches them together.

use json_schemata::prelude::*;
use serde_json::{Value, json};

pub const SEMVER: &str = r"^(?P<major>0|[1-9]\d*)\.(?P<minor>0|[1-9]\d*)\.(?P<patch>0|[1-9]\d*)(?:-(?P<prerelease>(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+(?P<buildmetadata>[0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";
pub const PRERELEASE_ID: &str = r"^[0-9A-Za-z-]+$";
pub const PACKAGE_NAME: &str = r"^(?:@[a-z0-9\-*~][a-z0-9\-*._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*$";
pub const BUMP_LEVELS: [&str; 7] = ["major", "minor", "patch", "premajor", "preminor", "prepatch", "prerelease"];

pub fn semver_defs() -> Result<SchemaBuilder> {
    let mut b = SchemaBuilder::new();
    b.add_definitions(Definitions::direct([
        ("semverBumpLevel", Schema::literal_union(BUMP_LEVELS).title("Semver Bump Level")),
        (
            "semverPrereleaseId",
            Schema::regex(PRERELEASE_ID, StringOptions::new().title("Prerelease ID").description(
                "The string used as the \"prerelease\" identifier. For example, version \"1.0.0-alpha.1\" has prerelease ID \"alpha\".",
            )),
        ),
        (
            "semver",
            Schema::regex(
                SEMVER,
                StringOptions::new()
                    .title("Semver")
                    .description("A semver version string, according to https://semver.org/")
                    .with("markdownDescription", "A [semver version string](https://semver.org/)."),
            ),
        ),
    ]))?;
    Ok(b)
}

pub fn package_json(semver: &SchemaBuilder) -> Result<SchemaBuilder> {
    SchemaBuilder::create(&[semver], |b| {
        b.add_definition(
            "_npmPackageName",
            Schema::string(
                StringOptions::new()
                    .description("The name of the package.")
                    .min_length(1)
                    .max_length(214)
                    .pattern(PACKAGE_NAME),
            ),
        )?
        .add_generated("npmPackageFileContent", |b| {
            Schema::object(
                [("name", b.def_ref("_npmPackageName")), ("version", b.def_ref("semver"))],
                ObjectOptions::new().title("Bscotch Project Configuration"),
            )
        })?
        .set_root("npmPackageFileContent")?;
        Ok(())
    })
}

pub fn version_store() -> Result<SchemaBuilder> {
    let mut b = SchemaBuilder::new();
    b.using(|b| -> Result<()> {
        b.add_definition(
            "_versionStoreFile",
            Schema::object(
                [
                    (
                        "path",
                        Schema::string(StringOptions::new().title("Version Store file path")).into(),
                    ),
                    (
                        "replace",
                        Schema::optional(Schema::object(
                            [
                                (
                                    "match",
                                    Schema::optional(Schema::string(
                                        StringOptions::new().title("Find and replace pattern").format("regex"),
                                    )),
                                ),
                                (
                                    "with",
                                    Schema::optional(Schema::regex(
                                        r"\{\{version\}\}",
                                        StringOptions::new().title("Replacement string"),
                                    )),
                                ),
                            ],
                            ObjectOptions::new(),
                        )?),
                    ),
                ],
                ObjectOptions::new(),
            )?,
        )?
        .add_definition(
            "_versionStoreJs",
            Schema::object(
                [
                    ("path", Schema::regex(r"\.(js|cjs|mjs|ts)$", StringOptions::new()).into()),
                    ("style", Schema::optional(Schema::literal_union(["esm", "commonjs"]).title("JavaScript Module Style"))),
                    ("exportName", Schema::optional(Schema::regex(r"^[a-zA-Z_$][a-zA-Z0-9_$]*$", StringOptions::new()))),
                ],
                ObjectOptions::new(),
            )?,
        )?
        .add_definition(
            "_versionStoreJson",
            Schema::object(
                [
                    ("path", Schema::regex(r"\.json[c5]?$", StringOptions::new().title("JSON Version Store Path")).into()),
                    ("field", Schema::optional(Schema::string(StringOptions::new().title("Version Field")))),
                ],
                ObjectOptions::new(),
            )?,
        )?
        .add_generated("versionStore", |b| {
            Ok(Schema::union([
                b.def_ref("_versionStoreJson"),
                b.def_ref("_versionStoreJs"),
                b.def_ref("_versionStoreFile"),
            ])
            .title("Version Store"))
        })?
        .set_root("versionStore")?;
        Ok(())
    })?;
    Ok(b)
}

pub fn repo_config() -> Result<SchemaBuilder> {
    let stores = version_store()?;
    let package = package_json(&semver_defs()?)?;
    let store_root = stores.root_schema().ok_or(SchemaError::NoRootDefined)?;
    let package_root = package.root_schema().ok_or(SchemaError::NoRootDefined)?;

    let mut config = SchemaBuilder::with_library(&stores);
    config
        .add_definitions(&package)?
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
                ObjectOptions::new().description("Versioning-related information."),
            )?,
        )?
        .add_generated("bscotchConfig", |b| {
            Ok(Schema::intersect([
                package_root,
                Schema::object(
                    [(
                        "bscotch",
                        Schema::optional(Schema::object(
                            [("versioning", Schema::optional(b.def_ref("bscotchVersioning")))],
                            ObjectOptions::new().title("Bscotch Repo Configuration"),
                        )?),
                    )],
                    ObjectOptions::new(),
                )?,
            ]))
        })?
        .set_root("bscotchConfig")?;
    Ok(config)
}

/// `(label, document, expected to be valid)`
pub fn config_documents() -> Vec<(&'static str, Value, bool)> {
    vec![
        ("minimal package", json!({"name": "@bscotch/repo", "version": "1.0.0"}), true),
        (
            "single store",
            json!({
                "name": "repo",
                "version": "0.3.1-rc.2",
                "bscotch": {"versioning": {"stores": {"path": "version.json", "field": "/version"}}}
            }),
            true,
        ),
        (
            "store list",
            json!({
                "name": "repo",
                "version": "2.0.0",
                "bscotch": {"versioning": {"stores": [
                    {"path": "src/version.ts", "style": "esm", "exportName": "VERSION"},
                    {"path": "VERSION", "replace": {"match": "^(const version = ).*;", "with": "$1'{{version}}';"}}
                ]}}
            }),
            true,
        ),
        ("missing version", json!({"name": "repo"}), false),
        (
            "bad store path",
            json!({
                "name": "repo",
                "version": "1.0.0",
                "bscotch": {"versioning": {"stores": [{"path": 12}]}}
            }),
            false,
        ),
        (
            "bad replacement",
            json!({
                "name": "repo",
                "version": "1.0.0",
                "bscotch": {"versioning": {"stores": {"path": "VERSION", "replace": {"with": "no placeholder"}}}}
            }),
            false,
        ),
    ]
}
