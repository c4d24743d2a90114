//! Lifecycle hook semantics: ordering, action scoping, around-hook
//! continuation behavior, and registration-time configuration errors.

use std::sync::{Arc, Mutex};

use serde_json::json;
use sidepost::ResourceBuilder;
use sidepost::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

fn log_entry(log: &Log, entry: &str) {
    log.lock().unwrap().push(entry.to_string());
}

fn document(raw: serde_json::Value) -> WriteDocument {
    WriteDocument::from_json(raw).unwrap()
}

fn base_builder() -> ResourceBuilder {
    ResourceDef::builder("employees")
        .attribute(AttributeInfo::new("id", "integer"))
        .attribute(AttributeInfo::new("first_name", "string"))
        .attribute(AttributeInfo::new("last_name", "string"))
}

#[test]
fn before_attributes_rename_applies_for_create_and_update() {
    // `first_name` is deliberately not declared; the hook renames it before
    // the table is consulted.
    let mut resources = ResourceRegistry::new();
    resources.insert(
        ResourceDef::builder("employees")
            .attribute(AttributeInfo::new("id", "integer"))
            .attribute(AttributeInfo::new("last_name", "string"))
            .before_attributes(HookScope::Both, |attrs| {
                if let Some(value) = attrs.remove("first_name") {
                    attrs.insert("last_name".to_string(), value);
                }
                Ok(())
            })
            .build(),
    );
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    let create = document(json!({
        "data": { "type": "employees", "attributes": { "first_name": "Jane" } }
    }));
    let mut proxy = Proxy::new(&resources, &types, &mut adapter, &create).unwrap();
    assert!(proxy.save().unwrap());
    let record = proxy.record().unwrap();
    assert_eq!(record.get("last_name"), Some(&Value::Text("Jane".into())));
    assert!(!record.has("first_name"));

    let update = document(json!({
        "data": { "type": "employees", "id": 1, "attributes": { "first_name": "Janet" } }
    }));
    let mut proxy = Proxy::new(&resources, &types, &mut adapter, &update).unwrap();
    assert!(proxy.save().unwrap());
    let record = proxy.record().unwrap();
    assert_eq!(record.get("last_name"), Some(&Value::Text("Janet".into())));
    assert!(!record.has("first_name"));

    let reloaded = adapter.find("employees", &Value::Int(1)).unwrap().unwrap();
    assert_eq!(reloaded.get("last_name"), Some(&Value::Text("Janet".into())));
    assert!(!reloaded.has("first_name"));
}

#[test]
fn around_save_mutations_before_continuation_persist_after_do_not() {
    let mut resources = ResourceRegistry::new();
    resources.insert(
        base_builder()
            .around_save(
                HookScope::Both,
                AroundSaveHook::named("stamp", |mut record, next| {
                    record.set("first_name", Value::Text("persisted-by-hook".into()));
                    let mut saved = next(record)?;
                    saved.set("last_name", Value::Text("memory-only".into()));
                    Ok(saved)
                }),
            )
            .unwrap()
            .build(),
    );
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    let doc = document(json!({
        "data": { "type": "employees", "attributes": {} }
    }));
    let mut proxy = Proxy::new(&resources, &types, &mut adapter, &doc).unwrap();
    assert!(proxy.save().unwrap());

    // The returned in-memory object carries both mutations.
    let record = proxy.record().unwrap();
    assert_eq!(
        record.get("first_name"),
        Some(&Value::Text("persisted-by-hook".into()))
    );
    assert_eq!(
        record.get("last_name"),
        Some(&Value::Text("memory-only".into()))
    );

    // A fresh load shows only the pre-continuation mutation.
    let reloaded = adapter.find("employees", &Value::Int(1)).unwrap().unwrap();
    assert_eq!(
        reloaded.get("first_name"),
        Some(&Value::Text("persisted-by-hook".into()))
    );
    assert!(!reloaded.has("last_name"));
}

#[test]
fn hooks_run_in_order_around_wrapping_the_operation() {
    let log: Log = Log::default();
    let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());

    let mut resources = ResourceRegistry::new();
    resources.insert(
        base_builder()
            .before_save(HookScope::Both, move |_| {
                log_entry(&l1, "before_save:first");
                Ok(())
            })
            .before_save(HookScope::Both, move |_| {
                log_entry(&l2, "before_save:second");
                Ok(())
            })
            .around_save(
                HookScope::Both,
                AroundSaveHook::named("trace", move |record, next| {
                    log_entry(&l3, "around_save:pre");
                    let saved = next(record)?;
                    log_entry(&l3, "around_save:post");
                    Ok(saved)
                }),
            )
            .unwrap()
            .after_save(HookScope::Both, move |_| {
                log_entry(&l4, "after_save");
                Ok(())
            })
            .build(),
    );
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    let doc = document(json!({
        "data": { "type": "employees", "attributes": { "first_name": "Jane" } }
    }));
    Proxy::new(&resources, &types, &mut adapter, &doc)
        .unwrap()
        .save()
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        [
            "before_save:first",
            "before_save:second",
            "around_save:pre",
            "around_save:post",
            "after_save"
        ]
    );
}

#[test]
fn destroy_hooks_never_fire_on_writes_and_vice_versa() {
    let log: Log = Log::default();
    let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
    let (l5, l6, l7) = (log.clone(), log.clone(), log.clone());

    let builder = base_builder()
        .before_attributes(HookScope::Both, move |_| {
            log_entry(&l1, "before_attributes");
            Ok(())
        })
        .after_attributes(HookScope::Both, move |_| {
            log_entry(&l2, "after_attributes");
            Ok(())
        })
        .before_save(HookScope::Both, move |_| {
            log_entry(&l3, "before_save");
            Ok(())
        })
        .after_save(HookScope::Both, move |_| {
            log_entry(&l4, "after_save");
            Ok(())
        })
        .before_destroy(move |_| {
            log_entry(&l5, "before_destroy");
            Ok(())
        })
        .after_destroy(move |_| {
            log_entry(&l6, "after_destroy");
            Ok(())
        })
        .around_destroy(AroundDestroyHook::named("trace", move |record, next| {
            log_entry(&l7, "around_destroy");
            next(record)
        }))
        .unwrap();

    let mut resources = ResourceRegistry::new();
    resources.insert(builder.build());
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    // create: only attribute/save hooks
    let create = document(json!({
        "data": { "type": "employees", "attributes": { "first_name": "Jane" } }
    }));
    Proxy::new(&resources, &types, &mut adapter, &create)
        .unwrap()
        .save()
        .unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        ["before_attributes", "after_attributes", "before_save", "after_save"]
    );

    // update: same set, still no destroy hooks
    log.lock().unwrap().clear();
    let update = document(json!({
        "data": { "type": "employees", "id": 1, "attributes": { "first_name": "Janet" } }
    }));
    Proxy::new(&resources, &types, &mut adapter, &update)
        .unwrap()
        .save()
        .unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        ["before_attributes", "after_attributes", "before_save", "after_save"]
    );

    // destroy: only destroy hooks
    log.lock().unwrap().clear();
    let destroy = document(json!({
        "data": { "type": "employees", "id": 1, "method": "destroy" }
    }));
    Proxy::new(&resources, &types, &mut adapter, &destroy)
        .unwrap()
        .save()
        .unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        ["before_destroy", "around_destroy", "after_destroy"]
    );
}

#[test]
fn update_scoped_hook_skips_create() {
    let log: Log = Log::default();
    let l = log.clone();

    let mut resources = ResourceRegistry::new();
    resources.insert(
        base_builder()
            .before_save(HookScope::UpdateOnly, move |_| {
                log_entry(&l, "update_only");
                Ok(())
            })
            .build(),
    );
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    let create = document(json!({
        "data": { "type": "employees", "attributes": { "first_name": "Jane" } }
    }));
    Proxy::new(&resources, &types, &mut adapter, &create)
        .unwrap()
        .save()
        .unwrap();
    assert!(log.lock().unwrap().is_empty());

    let update = document(json!({
        "data": { "type": "employees", "id": 1, "attributes": { "first_name": "Janet" } }
    }));
    Proxy::new(&resources, &types, &mut adapter, &update)
        .unwrap()
        .save()
        .unwrap();
    assert_eq!(*log.lock().unwrap(), ["update_only"]);
}

#[test]
fn around_attributes_wraps_coercion_and_assignment() {
    let mut resources = ResourceRegistry::new();
    resources.insert(
        base_builder()
            .around_attributes(
                HookScope::Both,
                AroundAttributesHook::named("inject", |mut attrs, next| {
                    attrs.insert("last_name".to_string(), json!("injected"));
                    let mut record = next(attrs)?;
                    record.set("first_name", Value::Text("post-assign".into()));
                    Ok(record)
                }),
            )
            .unwrap()
            .build(),
    );
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    let doc = document(json!({
        "data": { "type": "employees", "attributes": { "first_name": "Jane" } }
    }));
    let mut proxy = Proxy::new(&resources, &types, &mut adapter, &doc).unwrap();
    assert!(proxy.save().unwrap());

    // Both the injected raw attribute and the post-assignment mutation happen
    // before the save, so both persist.
    let reloaded = adapter.find("employees", &Value::Int(1)).unwrap().unwrap();
    assert_eq!(
        reloaded.get("last_name"),
        Some(&Value::Text("injected".into()))
    );
    assert_eq!(
        reloaded.get("first_name"),
        Some(&Value::Text("post-assign".into()))
    );
}

#[test]
fn anonymous_around_hooks_fail_at_registration_time() {
    let attrs_result = base_builder().around_attributes(
        HookScope::Both,
        AroundAttributesHook::anonymous(|attrs, next| next(attrs)),
    );
    assert!(matches!(
        attrs_result.unwrap_err(),
        ConfigError::AnonymousAroundHook { .. }
    ));

    let save_result = base_builder().around_save(
        HookScope::Both,
        AroundSaveHook::anonymous(|record, next| next(record)),
    );
    let err = save_result.unwrap_err();
    assert!(matches!(err, ConfigError::AnonymousAroundHook { .. }));
    assert!(err.to_string().contains("around_save"));
    assert!(err.to_string().contains("employees"));
}

#[test]
fn hook_error_aborts_the_operation() {
    let mut resources = ResourceRegistry::new();
    resources.insert(
        base_builder()
            .before_save(HookScope::Both, |_| {
                Err(Error::Hook {
                    hook: "ensure_quota".to_string(),
                    message: "quota exceeded".to_string(),
                })
            })
            .build(),
    );
    let types = TypeRegistry::with_builtins();
    let mut adapter = MemoryAdapter::new();

    let doc = document(json!({
        "data": { "type": "employees", "attributes": { "first_name": "Jane" } }
    }));
    let err = Proxy::new(&resources, &types, &mut adapter, &doc)
        .unwrap()
        .save()
        .unwrap_err();
    assert!(matches!(err, Error::Hook { .. }));
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(adapter.count("employees"), 0);
}
