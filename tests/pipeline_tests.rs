//! End-to-end pipeline tests
//!
//! Each test builds a small project (class descriptors, schema fragments,
//! compiler config) in a temp directory and runs the real compiler over it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tempfile::{tempdir, TempDir};

use schema_compiler::codegen::{CodeGenerationStore, FileCacheStore, HandlebarsEncoder, TemplateEncoder};
use schema_compiler::config::SchemaSource;
use schema_compiler::resolver::{ResolveArgs, ResolveError, ResolveResult, Step};
use schema_compiler::schema::{Definition, ScalarType};
use schema_compiler::{
    CacheStore, CompilerConfig, EncodedResolver, ResolverProvider, ResolverRef, ResolverRegistry,
    Schema, SchemaCompiler, SchemaError, SchemaRuntime,
};

const ARTICLE: &str = r#"
class = "Shop.Article"
description = "A published article"

[fields]
id = "ID!"
title = "String"
"#;

const BANNER: &str = r#"
class = "Shop.Banner"

[fields]
image = "String"
"#;

const COMMENT: &str = r#"
class = "Shop.Comment"
extends = "Shop.Article"

[fields]
body = "String"
"#;

/// Inheritance include Article (keeps Article and Comment), then namespace exclude `*Comment`
const SELECT_ARTICLE: &str = r#"
[content]
load = [
  { loader = "inheritanceLoader", include = ["Shop.Article"] },
  { loader = "namespaceLoader", exclude = ["*Comment"] },
]

[content.apply]
operations = ["read"]
"#;

const SELECT_BANNER: &str = r#"
[content]
load = [{ loader = "namespaceLoader", include = ["Shop.Banner"] }]
"#;

struct Project {
    dir: TempDir,
    config: CompilerConfig,
}

impl Project {
    fn new(bulk_load: &str) -> Self {
        let dir = tempdir().unwrap();
        let models = dir.path().join("models");
        fs::create_dir_all(&models).unwrap();
        fs::write(models.join("article.toml"), ARTICLE).unwrap();
        fs::write(models.join("banner.toml"), BANNER).unwrap();
        fs::write(models.join("comment.toml"), COMMENT).unwrap();

        let mut config = CompilerConfig::default();
        config.project.root = dir.path().to_path_buf();
        config.schemas.insert(
            "default".to_string(),
            SchemaSource {
                src: vec![PathBuf::from("graphql/default")],
            },
        );

        let project = Self { dir, config };
        project.write_fragment("bulkLoad.toml", bulk_load);
        project
    }

    fn write_fragment(&self, file: &str, content: &str) {
        let src = self.dir.path().join("graphql/default");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join(file), content).unwrap();
    }

    fn compiler(&self) -> SchemaCompiler {
        SchemaCompiler::new(self.config.clone()).unwrap()
    }

    fn live(&self) -> PathBuf {
        self.dir.path().join("generated/graphql/default")
    }

    fn cache_file(&self) -> PathBuf {
        self.dir.path().join(".graphql-cache/signatures.json")
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// =============================================================================
// Bulk loading
// =============================================================================

#[test]
fn test_inheritance_then_namespace_exclude_selects_one_class() {
    let project = Project::new(SELECT_ARTICLE);
    let compiler = project.compiler();

    let blocks = compiler.select_classes("default").unwrap();
    let selected: Vec<&str> = blocks["content"].classes().collect();
    assert_eq!(selected, vec!["Shop.Article"]);

    let schema = compiler.compile("default").unwrap();
    assert!(schema.contains("Article"));
    assert!(!schema.contains("Comment"));
    assert!(!schema.contains("Banner"));
    assert!(schema.object("Query").unwrap().fields.contains_key("readArticles"));
}

#[test]
fn test_unknown_loader_target_aborts_build() {
    let project = Project::new(
        r#"
[content]
load = [{ loader = "inheritanceLoader", include = ["Shop.Articel"] }]
"#,
    );
    let err = project.compiler().build("default").unwrap_err();
    assert!(matches!(err, SchemaError::UnknownClass { .. }));
    assert!(!project.live().exists());
}

#[test]
fn test_unknown_schema_name() {
    let project = Project::new(SELECT_ARTICLE);
    let err = project.compiler().build("defualt").unwrap_err();
    assert!(matches!(err, SchemaError::Config { ref key, .. } if key == "schemas.defualt"));
}

// =============================================================================
// Resolver discovery and composition
// =============================================================================

fn first_resolve(source: &Value, _args: &ResolveArgs<'_>) -> ResolveResult<Value> {
    Ok(json!({"from": "First::resolve", "source": source}))
}

fn second_resolve_title(_source: &Value, _args: &ResolveArgs<'_>) -> ResolveResult<Value> {
    Ok(json!("Second::resolveTitle"))
}

#[test]
fn test_specific_name_on_later_provider_wins() {
    let project = Project::new(SELECT_ARTICLE);
    let mut config = project.config.clone();
    config.resolvers = vec!["First".to_string(), "Second".to_string()];

    let mut registry = ResolverRegistry::with_builtins();
    registry.register(ResolverProvider::new("First").resolver("resolve", first_resolve));
    registry.register(ResolverProvider::new("Second").resolver("resolveTitle", second_resolve_title));

    let compiler = SchemaCompiler::with_resolvers(config, registry).unwrap();
    let schema = compiler.compile("default").unwrap();
    let article = schema.object("Article").unwrap();

    let title = article.fields["title"].resolver.as_ref().unwrap();
    assert_eq!(title.reference, ResolverRef::new("Second", "resolveTitle"));
    let id = article.fields["id"].resolver.as_ref().unwrap();
    assert_eq!(id.reference, ResolverRef::new("First", "resolve"));
}

static LOG: AtomicUsize = AtomicUsize::new(0);

fn count_then_continue(value: Value, _args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    LOG.fetch_add(1, Ordering::SeqCst);
    Ok(Step::Continue(value))
}

fn upper(source: &Value, _args: &ResolveArgs<'_>) -> ResolveResult<Value> {
    let text = source.as_str().ok_or_else(|| ResolveError::failed("not a string"))?;
    Ok(json!(text.to_uppercase()))
}

fn finish(value: Value, _args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    Ok(Step::Done(json!({"done": value})))
}

fn never(_value: Value, _args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    panic!("afterware after a done step must not run");
}

#[test]
fn test_done_afterware_short_circuits_the_chain() {
    let registry = {
        let mut registry = ResolverRegistry::empty();
        registry.register(
            ResolverProvider::new("Text")
                .chain("count", count_then_continue)
                .resolver("upper", upper)
                .chain("finish", finish)
                .chain("never", never),
        );
        registry
    };

    let encoded = EncodedResolver::new(ResolverRef::new("Text", "upper"))
        .with_middleware(EncodedResolver::new(ResolverRef::new("Text", "count")))
        .with_afterware(EncodedResolver::new(ResolverRef::new("Text", "finish")))
        .with_afterware(EncodedResolver::new(ResolverRef::new("Text", "never")));

    // Round trip through the persisted form first
    let decoded = EncodedResolver::decode(&encoded.encode().unwrap()).unwrap();
    let composed = decoded.compose(&registry).unwrap();

    let before = LOG.load(Ordering::SeqCst);
    let value = composed
        .resolve(&json!("hello"), "title", &Map::new(), &Value::Null)
        .unwrap();
    assert_eq!(value, json!({"done": "HELLO"}));
    assert_eq!(LOG.load(Ordering::SeqCst), before + 1);
}

// =============================================================================
// Code generation
// =============================================================================

#[test]
fn test_build_writes_artifacts_and_registry() {
    let project = Project::new(SELECT_ARTICLE);
    let report = project.compiler().build("default").unwrap();

    assert_eq!(report.written, vec!["Article", "Query"]);
    assert_eq!(report.directory, project.live());

    let article = read(&project.live().join("Article.graphql"));
    assert!(article.contains("A published article"));
    assert!(article.contains("type Article {"));
    assert!(article.contains(r#"title: String @resolver(encoded: "{\"ref\":\"Builtin::resolve\"}")"#));

    let query = read(&project.live().join("Query.graphql"));
    assert!(query.contains("readArticles(offset: Int, limit: Int): [Article]"));

    let registry: Value = serde_json::from_str(&read(&project.live().join("__registry.json"))).unwrap();
    assert_eq!(registry["schema"], "default");
    assert_eq!(registry["artifacts"]["Query"]["file"], "Query.graphql");

    assert!(project.live().join("_manifest_exclude").exists());
    assert!(project.live().join(".gitattributes").exists());
}

#[test]
fn test_build_all_covers_every_configured_schema() {
    let mut project = Project::new(SELECT_ARTICLE);
    project.config.schemas.insert(
        "banners".to_string(),
        SchemaSource {
            src: vec![PathBuf::from("graphql/banners")],
        },
    );
    let banners = project.dir.path().join("graphql/banners");
    fs::create_dir_all(&banners).unwrap();
    fs::write(banners.join("bulkLoad.toml"), SELECT_BANNER).unwrap();

    let reports = project.compiler().build_all().unwrap();
    let names: Vec<&str> = reports.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["banners", "default"]);
    assert_eq!(reports[0].1.written, vec!["Banner"]);
    assert_eq!(reports[1].1.written, vec!["Article", "Query"]);
    assert!(project
        .dir
        .path()
        .join("generated/graphql/banners/Banner.graphql")
        .exists());
}

#[test]
fn test_second_build_changes_nothing() {
    let project = Project::new(SELECT_ARTICLE);
    project.compiler().build("default").unwrap();
    let cache_before = read(&project.cache_file());
    let article_before = read(&project.live().join("Article.graphql"));

    let report = project.compiler().build("default").unwrap();
    assert!(report.written.is_empty());
    assert!(report.deleted.is_empty());
    assert_eq!(report.unchanged, vec!["Article", "Query"]);
    assert_eq!(read(&project.cache_file()), cache_before);
    assert_eq!(read(&project.live().join("Article.graphql")), article_before);
}

#[test]
fn test_dropped_classes_are_deleted() {
    let project = Project::new(SELECT_ARTICLE);
    project.compiler().build("default").unwrap();

    project.write_fragment("bulkLoad.toml", SELECT_BANNER);
    let report = project.compiler().build("default").unwrap();

    assert_eq!(report.written, vec!["Banner"]);
    assert_eq!(report.deleted, vec!["Article", "Query"]);
    assert!(!project.live().join("Article.graphql").exists());
    assert!(project.live().join("Banner.graphql").exists());

    let cache = FileCacheStore::open(project.cache_file()).unwrap();
    assert_eq!(cache.keys().unwrap(), vec!["default:Banner"]);
}

#[test]
fn test_type_name_outside_graphql_syntax_aborts_before_writing() {
    let project = Project::new(SELECT_ARTICLE);
    project.compiler().build("default").unwrap();
    let article_before = read(&project.live().join("Article.graphql"));

    project.write_fragment("scalars.toml", "[\"../escaped\"]\n");
    let err = project.compiler().build("default").unwrap_err();
    assert!(matches!(err, SchemaError::Config { ref key, .. } if key == "scalars.../escaped"));

    let output = project.dir.path().join("generated/graphql");
    assert!(!output.join("escaped.graphql").exists());
    assert!(!project.live().join("../escaped.graphql").exists());
    assert_eq!(read(&project.live().join("Article.graphql")), article_before);
}

#[derive(Debug)]
struct FailingEncoder;

impl TemplateEncoder for FailingEncoder {
    fn render(&self, template: &str, _scope: &Value) -> schema_compiler::Result<String> {
        Err(SchemaError::Template {
            template: template.to_string(),
            message: "refusing to render".to_string(),
        })
    }
}

#[test]
fn test_failed_staging_leaves_live_schema_intact() {
    let project = Project::new(SELECT_ARTICLE);
    let compiler = project.compiler();
    compiler.build("default").unwrap();

    let article_before = read(&project.live().join("Article.graphql"));
    let cache_before = read(&project.cache_file());

    // Same schema plus one new type, rendered by an encoder that always fails
    let mut schema: Schema = compiler.compile("default").unwrap();
    schema
        .add(Definition::Scalar(ScalarType {
            name: "DateTime".to_string(),
            description: None,
        }))
        .unwrap();
    let failing = CodeGenerationStore::new(
        project.dir.path().join("generated/graphql"),
        Arc::new(FileCacheStore::open(project.cache_file()).unwrap()),
        Arc::new(FailingEncoder),
    );
    assert!(failing.persist(&schema).is_err());

    assert_eq!(read(&project.live().join("Article.graphql")), article_before);
    assert!(!project.live().join("DateTime.graphql").exists());
    assert_eq!(read(&project.cache_file()), cache_before);

    let leftovers: Vec<String> = fs::read_dir(project.dir.path().join("generated/graphql"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["default"]);
}

// =============================================================================
// Runtime
// =============================================================================

#[test]
fn test_runtime_builds_missing_schema_on_first_use() {
    let project = Project::new(SELECT_ARTICLE);
    let compiler = Arc::new(project.compiler());
    assert!(!project.live().exists());

    let runtime = compiler.runtime("default");
    let query = runtime.artifact("Query").unwrap();
    assert!(query.source.contains("readArticles"));

    let read_articles = runtime.resolver("Query", "readArticles").unwrap();
    let root = json!({"articles": [{"id": "1"}, {"id": "2"}, {"id": "3"}]});
    let args = serde_json::from_value::<Map<String, Value>>(json!({"offset": 1, "limit": 1})).unwrap();
    let page = read_articles.resolve(&root, "readArticles", &args, &Value::Null).unwrap();
    assert_eq!(page, json!([{"id": "2"}]));
}

#[test]
fn test_runtime_heals_a_deleted_artifact_once() {
    let project = Project::new(SELECT_ARTICLE);
    project.compiler().build("default").unwrap();
    fs::remove_file(project.live().join("Article.graphql")).unwrap();

    let compiler = Arc::new(project.compiler());
    let rebuilds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rebuilds);
    let inner = Arc::clone(&compiler);
    let runtime = SchemaRuntime::new(
        compiler.store().root(),
        "default",
        Arc::clone(compiler.resolvers()),
    )
    .with_rebuild(move |name| {
        counter.fetch_add(1, Ordering::SeqCst);
        inner.build(name).map(|_| ())
    });

    let article = runtime.artifact("Article").unwrap();
    assert!(article.source.contains("type Article"));
    assert_eq!(rebuilds.load(Ordering::SeqCst), 1);

    // Unknown even after rebuilding: one more rebuild attempt, then the error
    let err = runtime.artifact("Comment").unwrap_err();
    assert!(matches!(err, SchemaError::ArtifactNotFound { .. }));
    assert_eq!(rebuilds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_runtime_without_auto_build_reports_stale_schema() {
    let project = Project::new(SELECT_ARTICLE);
    let mut config = project.config.clone();
    config.output.auto_build = false;
    let compiler = Arc::new(SchemaCompiler::new(config).unwrap());

    let err = compiler.runtime("default").artifact("Article").unwrap_err();
    assert!(matches!(err, SchemaError::SchemaNotBuilt(_)));
}

#[test]
fn test_handlebars_encoder_is_the_default() {
    // Sanity check that the embedded templates are what the compiler renders with
    let encoder = HandlebarsEncoder::new().unwrap();
    let text = encoder.render("scalar", &json!({"name": "DateTime"})).unwrap();
    assert_eq!(text.trim(), "scalar DateTime");
}
