//! Schema Builder
//!
//! Drives one compilation:
//! 1. validate resolver settings and every bulk-load block (before any work)
//! 2. run the blocks and merge their `apply` settings per selected class
//! 3. model each class once and turn it into an object type
//! 4. bind a resolver to every output field (explicit, else discovery)
//! 5. add generated operations and declared types
//! 6. validate the finished graph

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classes::{ClassIndex, Collection, Reflection};
use crate::error::{suggest, Result, SchemaError};
use crate::loader::{LoaderRegistry, LoaderSet};
use crate::model::{ModelCreator, SchemaModel};
use crate::names::{pluralize, to_camel_case};
use crate::resolver::{
    builtin, discover, EncodedResolver, FieldSite, ResolverProvider, ResolverRef, ResolverRegistry,
    ResolverStrategy,
};

use super::settings::{
    BulkLoadBlock, EnumSettings, EnumValues, FieldSettings, InputSettings, InterfaceSettings,
    ModelSettings, Operation, ScalarSettings, TypeSettings, UnionSettings,
};
use super::{
    Argument, Definition, EnumType, EnumValue, Field, InputField, InputType, InterfaceType,
    ObjectType, ScalarType, Schema, SchemaContext, UnionType, MUTATION_TYPE, QUERY_TYPE,
};

/// Resolver settings validated once per build
struct Bindings<'r> {
    strategy: Arc<dyn ResolverStrategy>,
    providers: Vec<&'r ResolverProvider>,
    default: Option<ResolverRef>,
}

/// Compiles a [`SchemaContext`] into a validated [`Schema`]
pub struct SchemaBuilder<'a> {
    index: &'a ClassIndex,
    loaders: &'a LoaderRegistry,
    resolvers: &'a ResolverRegistry,
    creators: &'a [Arc<dyn ModelCreator>],
    base_dir: &'a Path,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(
        index: &'a ClassIndex,
        loaders: &'a LoaderRegistry,
        resolvers: &'a ResolverRegistry,
        creators: &'a [Arc<dyn ModelCreator>],
        base_dir: &'a Path,
    ) -> Self {
        Self {
            index,
            loaders,
            resolvers,
            creators,
            base_dir,
        }
    }

    /// Classes each bulk-load block selects, keyed by block name
    pub fn select_classes(&self, ctx: &SchemaContext) -> Result<BTreeMap<String, Collection>> {
        Ok(self
            .run_blocks(ctx)?
            .into_iter()
            .map(|(name, _, collection)| (name, collection))
            .collect())
    }

    pub fn build(&self, ctx: &mut SchemaContext) -> Result<Schema> {
        info!(schema = ctx.name(), "compiling schema");
        let bindings = self.bindings(ctx)?;
        let classes = self.apply_bulk_load(ctx)?;

        let mut models = Vec::with_capacity(classes.len());
        let mut exposed = BTreeMap::new();
        for class in &classes {
            let model = ctx.model(class, self.creators)?;
            exposed.insert(class.clone(), model.type_name().to_string());
            models.push(model);
        }

        let mut schema = Schema::new(ctx.name());
        for model in &models {
            let class = model.source_class().to_string();
            let settings: ModelSettings = ctx
                .get_as(&["models", class.as_str()])?
                .unwrap_or_default();
            let object = self.model_type(ctx, &bindings, model.as_ref(), &settings, &exposed)?;
            schema.add(Definition::Object(object))?;
            self.add_operations(&mut schema, model.as_ref(), &settings)?;
        }

        self.add_declared(ctx, &bindings, &mut schema)?;
        schema.validate()?;

        info!(
            schema = ctx.name(),
            classes = classes.len(),
            definitions = schema.len(),
            "schema compiled"
        );
        Ok(schema)
    }

    // === Configuration ===

    fn bindings(&self, ctx: &SchemaContext) -> Result<Bindings<'a>> {
        let strategy = self.resolvers.strategy(&ctx.resolver_strategy()?)?;
        let providers = self.resolvers.providers_in_order(&ctx.resolver_providers()?)?;
        let default = ctx.default_resolver()?;
        if let Some(default) = &default {
            self.resolvers
                .resolver_fn(default)
                .map_err(|e| SchemaError::config("defaultResolver", e.to_string()))?;
        }
        Ok(Bindings {
            strategy,
            providers,
            default,
        })
    }

    fn run_blocks(&self, ctx: &SchemaContext) -> Result<Vec<(String, Map<String, Value>, Collection)>> {
        let blocks: BTreeMap<String, BulkLoadBlock> = ctx.get_as("bulkLoad")?.unwrap_or_default();

        // Every block is validated before any of them runs.
        let mut sets = Vec::with_capacity(blocks.len());
        for (name, block) in blocks {
            let set = LoaderSet::from_config(self.index.collection(), &block.load, self.loaders, self.base_dir)?;
            set.validate(self.index)?;
            sets.push((name, block.apply, set));
        }

        let mut runs = Vec::with_capacity(sets.len());
        for (name, apply, set) in sets {
            let selected = set.process(self.index)?;
            info!(block = %name, classes = selected.len(), "bulk load block selected classes");
            runs.push((name, apply, selected));
        }
        Ok(runs)
    }

    /// Merge block `apply` settings and explicit `models` settings per class.
    ///
    /// Later blocks override earlier ones; explicit settings override all blocks.
    fn apply_bulk_load(&self, ctx: &mut SchemaContext) -> Result<BTreeSet<String>> {
        let explicit: Map<String, Value> = ctx.get_as("models")?.unwrap_or_default();
        for class in explicit.keys() {
            if !self.index.class_exists(class) {
                return Err(SchemaError::UnknownClass {
                    class: class.clone(),
                    suggestion: suggest(class, self.index.known_names()),
                });
            }
        }

        let mut classes: BTreeSet<String> = explicit.keys().cloned().collect();
        for (_, apply, selected) in self.run_blocks(ctx)? {
            for class in selected.classes() {
                ctx.merge(&["models", class], Value::Object(apply.clone()))?;
                classes.insert(class.to_string());
            }
        }
        for (class, settings) in explicit {
            ctx.merge(&["models", class.as_str()], settings)?;
        }
        Ok(classes)
    }

    // === Models ===

    fn model_type(
        &self,
        ctx: &mut SchemaContext,
        bindings: &Bindings<'_>,
        model: &dyn SchemaModel,
        settings: &ModelSettings,
        exposed: &BTreeMap<String, String>,
    ) -> Result<ObjectType> {
        let class = model.source_class();
        let type_name = model.type_name().to_string();
        let key = format!("models.{}.fields", class);

        let mut object = ObjectType::new(type_name.clone());
        object.description = settings
            .description
            .clone()
            .or_else(|| model.description().map(str::to_string));
        object.interfaces = settings.interfaces.clone();

        let field_names = model.field_names();
        for (name, field_settings) in settings.fields.resolve(&field_names, &key)? {
            if settings.exclude_fields.contains(&name) {
                continue;
            }
            let model_field = model.field(&name);

            let type_ref = match (&field_settings.type_ref, model_field) {
                (Some(t), _) => t.clone(),
                (None, Some(mf)) => {
                    if let Some(target) = &mf.target_class {
                        if !exposed.contains_key(target) {
                            warn!(
                                class,
                                field = %name,
                                target = %target,
                                "skipping field: referenced class is not exposed in this schema"
                            );
                            continue;
                        }
                    }
                    mf.type_ref.clone()
                }
                (None, None) => {
                    let hint = suggest(&name, field_names.iter().copied())
                        .map(|s| format!(" (did you mean '{}'?)", s))
                        .unwrap_or_default();
                    return Err(SchemaError::config(
                        key,
                        format!("'{}' has no field '{}'{}", class, name, hint),
                    ));
                }
            };

            let mut args: BTreeMap<String, String> =
                model_field.map(|f| f.args.clone()).unwrap_or_default();
            args.extend(field_settings.args.clone());

            let explicit = match field_settings.explicit_resolver()? {
                Some(r) => Some(r),
                None => model_field.and_then(|f| f.resolver.clone()),
            };
            let primary = self.primary_resolver(ctx, bindings, &type_name, &name, Some(model), explicit)?;

            let mut field = Field::new(name.clone(), type_ref);
            field.description = field_settings
                .description
                .clone()
                .or_else(|| model_field.and_then(|f| f.description.clone()));
            field.args = to_arguments(args);
            field.resolver = Some(self.bind(field_settings.encode(primary)?)?);
            object.add_field(field);
        }

        debug!(class, type_name = %type_name, fields = object.fields.len(), "modeled class");
        Ok(object)
    }

    fn add_operations(&self, schema: &mut Schema, model: &dyn SchemaModel, settings: &ModelSettings) -> Result<()> {
        let type_name = model.type_name();
        let plural = pluralize(type_name);
        let collection = to_camel_case(&plural);

        let operations: BTreeSet<Operation> = settings.operations.iter().copied().collect();
        for operation in operations {
            let read = EncodedResolver::new(ResolverRef::new(builtin::PROVIDER, "read"))
                .with_context("collection", Value::String(collection.clone()))?
                .with_afterware(EncodedResolver::new(ResolverRef::new(builtin::PROVIDER, "filterByArgs")));

            let field = match operation {
                Operation::Read => Field::new(format!("read{}", plural), format!("[{}]", type_name))
                    .with_arg("offset", "Int")
                    .with_arg("limit", "Int")
                    .with_resolver(self.bind(
                        read.with_afterware(EncodedResolver::new(ResolverRef::new(builtin::PROVIDER, "paginate"))),
                    )?),
                Operation::ReadOne => Field::new(format!("readOne{}", type_name), type_name)
                    .with_arg("id", "ID")
                    .with_resolver(self.bind(
                        read.with_afterware(EncodedResolver::new(ResolverRef::new(builtin::PROVIDER, "first"))),
                    )?),
            };

            let query = schema.object_mut_or_insert(QUERY_TYPE)?;
            if query.fields.contains_key(&field.name) {
                return Err(SchemaError::config(
                    format!("models.{}.operations", model.source_class()),
                    format!("query field '{}' is generated twice", field.name),
                ));
            }
            query.add_field(field);
        }
        Ok(())
    }

    // === Declared types ===

    fn add_declared(&self, ctx: &mut SchemaContext, bindings: &Bindings<'_>, schema: &mut Schema) -> Result<()> {
        let scalars: BTreeMap<String, ScalarSettings> = ctx.get_as("scalars")?.unwrap_or_default();
        for (name, s) in scalars {
            schema.add(Definition::Scalar(ScalarType {
                name,
                description: s.description,
            }))?;
        }

        let enums: BTreeMap<String, EnumSettings> = ctx.get_as("enums")?.unwrap_or_default();
        for (name, e) in enums {
            let values = match e.values {
                EnumValues::Names(names) => names
                    .into_iter()
                    .map(|name| EnumValue { name, description: None })
                    .collect(),
                EnumValues::Described(map) => map
                    .into_iter()
                    .map(|(name, d)| EnumValue {
                        name,
                        description: Some(d),
                    })
                    .collect(),
            };
            schema.add(Definition::Enum(EnumType {
                name,
                description: e.description,
                values,
            }))?;
        }

        let inputs: BTreeMap<String, InputSettings> = ctx.get_as("inputs")?.unwrap_or_default();
        for (name, i) in inputs {
            let fields = i
                .fields
                .into_iter()
                .map(|(field, f)| {
                    let input = InputField {
                        name: field.clone(),
                        type_ref: f.type_ref,
                        description: f.description,
                        default: f.default,
                    };
                    (field, input)
                })
                .collect();
            schema.add(Definition::Input(InputType {
                name,
                description: i.description,
                fields,
            }))?;
        }

        let unions: BTreeMap<String, UnionSettings> = ctx.get_as("unions")?.unwrap_or_default();
        for (name, u) in unions {
            schema.add(Definition::Union(UnionType {
                name,
                description: u.description,
                members: u.types,
            }))?;
        }

        let interfaces: BTreeMap<String, InterfaceSettings> = ctx.get_as("interfaces")?.unwrap_or_default();
        for (name, i) in interfaces {
            let mut fields = BTreeMap::new();
            for (field, f) in &i.fields {
                let mut declared = Field::new(field.clone(), required_type(&name, field, f)?);
                declared.description = f.description.clone();
                declared.args = to_arguments(f.args.clone());
                fields.insert(field.clone(), declared);
            }
            schema.add(Definition::Interface(InterfaceType {
                name,
                description: i.description,
                fields,
            }))?;
        }

        let types: BTreeMap<String, TypeSettings> = ctx.get_as("types")?.unwrap_or_default();
        for (name, t) in types {
            let mut object = ObjectType::new(name.clone());
            object.description = t.description.clone();
            object.interfaces = t.interfaces.clone();
            for (field, f) in &t.fields {
                object.add_field(self.declared_field(ctx, bindings, &name, field, f)?);
            }
            schema.add(Definition::Object(object))?;
        }

        for (setting, root) in [("queries", QUERY_TYPE), ("mutations", MUTATION_TYPE)] {
            let fields: BTreeMap<String, FieldSettings> = ctx.get_as(setting)?.unwrap_or_default();
            for (field, f) in &fields {
                let declared = self.declared_field(ctx, bindings, root, field, f)?;
                let object = schema.object_mut_or_insert(root)?;
                if object.fields.contains_key(field) {
                    debug!(field = %field, root, "declared field replaces generated operation");
                }
                object.add_field(declared);
            }
        }
        Ok(())
    }

    fn declared_field(
        &self,
        ctx: &mut SchemaContext,
        bindings: &Bindings<'_>,
        type_name: &str,
        name: &str,
        settings: &FieldSettings,
    ) -> Result<Field> {
        let mut field = Field::new(name, required_type(type_name, name, settings)?);
        field.description = settings.description.clone();
        field.args = to_arguments(settings.args.clone());

        let explicit = settings.explicit_resolver()?;
        let primary = self.primary_resolver(ctx, bindings, type_name, name, None, explicit)?;
        field.resolver = Some(self.bind(settings.encode(primary)?)?);
        Ok(field)
    }

    // === Resolvers ===

    /// Explicit reference, cached decision, or discovery, in that order
    fn primary_resolver(
        &self,
        ctx: &mut SchemaContext,
        bindings: &Bindings<'_>,
        type_name: &str,
        field: &str,
        model: Option<&dyn SchemaModel>,
        explicit: Option<ResolverRef>,
    ) -> Result<ResolverRef> {
        if let Some(reference) = explicit {
            return Ok(reference);
        }
        if let Some(cached) = ctx.resolver_decision(type_name, field) {
            return Ok(cached.clone());
        }

        let site = FieldSite {
            type_name,
            field,
            model: model.map(|m| m.identifier()),
        };
        let found = discover(
            bindings.strategy.as_ref(),
            &bindings.providers,
            &site,
            model.and_then(|m| m.default_resolver(field)),
            bindings.default.as_ref(),
        )?;
        ctx.record_resolver_decision(type_name, field, found.clone());
        Ok(found)
    }

    /// Fail the build now if any reference in the chain cannot be bound
    fn bind(&self, encoded: EncodedResolver) -> Result<EncodedResolver> {
        encoded.compose(self.resolvers)?;
        Ok(encoded)
    }
}

fn required_type(type_name: &str, field: &str, settings: &FieldSettings) -> Result<String> {
    settings.type_ref.clone().ok_or_else(|| {
        SchemaError::config(format!("{}.{}", type_name, field), "declared fields need a 'type'")
    })
}

fn to_arguments(args: BTreeMap<String, String>) -> Vec<Argument> {
    args.into_iter()
        .map(|(name, type_ref)| Argument { name, type_ref })
        .collect()
}
