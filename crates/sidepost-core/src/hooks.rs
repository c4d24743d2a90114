//! Lifecycle hooks.
//!
//! Each resource owns one [`HookSet`] with nine lifecycle points:
//! before/after/around crossed with attributes/save/destroy.
//!
//! # Execution contract
//!
//! Per point: every before hook in registration order, then the guarded
//! operation (wrapped by the point's single around hook, if any), then every
//! after hook in registration order. Before hooks mutate their input in place
//! and the mutation is visible downstream; after hooks run only on success and
//! their record mutations are never re-persisted.
//!
//! Around hooks receive the pre-state and a continuation. They must invoke the
//! continuation exactly once to perform the guarded operation and may transform
//! its result before returning it. Because the continuation needs an explicit
//! target, an around hook must be registered under a name via
//! [`AroundHook::named`]; an anonymous closure is rejected at registration time
//! with [`ConfigError::AnonymousAroundHook`].
//!
//! A hook returning `Err` aborts the node's persistence; the orchestrator never
//! catches it.

use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::error::{ConfigError, Result};
use crate::record::Record;
use crate::value::RawAttributes;

/// The nine lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeAttributes,
    AroundAttributes,
    AfterAttributes,
    BeforeSave,
    AroundSave,
    AfterSave,
    BeforeDestroy,
    AroundDestroy,
    AfterDestroy,
}

impl HookPoint {
    /// Snake-case name as used in configuration and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HookPoint::BeforeAttributes => "before_attributes",
            HookPoint::AroundAttributes => "around_attributes",
            HookPoint::AfterAttributes => "after_attributes",
            HookPoint::BeforeSave => "before_save",
            HookPoint::AroundSave => "around_save",
            HookPoint::AfterSave => "after_save",
            HookPoint::BeforeDestroy => "before_destroy",
            HookPoint::AroundDestroy => "around_destroy",
            HookPoint::AfterDestroy => "after_destroy",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restricts an attribute/save hook to a subset of write actions.
///
/// Destroy hooks are inherently destroy-only and take no scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookScope {
    /// Fire on both create and update.
    #[default]
    Both,
    /// Fire only when the node's action is create.
    CreateOnly,
    /// Fire only when the node's action is update.
    UpdateOnly,
}

impl HookScope {
    /// Whether a hook with this scope fires under `action`.
    #[must_use]
    pub fn applies_to(self, action: Action) -> bool {
        match self {
            HookScope::Both => action.is_write(),
            HookScope::CreateOnly => action == Action::Create,
            HookScope::UpdateOnly => action == Action::Update,
        }
    }
}

/// Before-attributes hook: mutates the raw, pre-coercion attribute map.
pub type RawAttrsHookFn = Arc<dyn Fn(&mut RawAttributes) -> Result<()> + Send + Sync>;

/// Record-level hook (after_attributes, before/after save, before/after destroy).
pub type RecordHookFn = Arc<dyn Fn(&mut Record) -> Result<()> + Send + Sync>;

/// Around-attributes implementation: raw attributes in, continuation performs
/// coercion + assignment and returns the populated record.
pub type AroundAttributesFn = Arc<
    dyn Fn(RawAttributes, &mut dyn FnMut(RawAttributes) -> Result<Record>) -> Result<Record>
        + Send
        + Sync,
>;

/// Around-save / around-destroy implementation: record in, continuation
/// delegates to the adapter and returns the resulting record.
pub type AroundRecordFn = Arc<
    dyn Fn(Record, &mut dyn FnMut(Record) -> Result<Record>) -> Result<Record> + Send + Sync,
>;

/// An around hook plus its (mandatory) registration name.
///
/// Construct with [`AroundHook::named`]; [`AroundHook::anonymous`] exists so a
/// call site can demonstrate the registration-time rejection, but a `HookSet`
/// will refuse to store one.
#[derive(Clone)]
pub struct AroundHook<F> {
    name: Option<&'static str>,
    f: F,
}

/// Around hook for the attributes point.
pub type AroundAttributesHook = AroundHook<AroundAttributesFn>;

/// Around hook for the save point.
pub type AroundSaveHook = AroundHook<AroundRecordFn>;

/// Around hook for the destroy point.
pub type AroundDestroyHook = AroundHook<AroundRecordFn>;

impl<F> AroundHook<F> {
    /// The registration name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

impl<F> fmt::Debug for AroundHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AroundHook").field("name", &self.name).finish_non_exhaustive()
    }
}

impl AroundHook<AroundAttributesFn> {
    /// A named around-attributes hook.
    pub fn named<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(RawAttributes, &mut dyn FnMut(RawAttributes) -> Result<Record>) -> Result<Record>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: Some(name),
            f: Arc::new(f),
        }
    }

    /// An anonymous around-attributes hook; rejected at registration.
    pub fn anonymous<F>(f: F) -> Self
    where
        F: Fn(RawAttributes, &mut dyn FnMut(RawAttributes) -> Result<Record>) -> Result<Record>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            f: Arc::new(f),
        }
    }

    /// Invoke the hook with the pre-state and the continuation.
    pub fn call(
        &self,
        attrs: RawAttributes,
        next: &mut dyn FnMut(RawAttributes) -> Result<Record>,
    ) -> Result<Record> {
        (self.f)(attrs, next)
    }
}

impl AroundHook<AroundRecordFn> {
    /// A named around-save / around-destroy hook.
    pub fn named<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(Record, &mut dyn FnMut(Record) -> Result<Record>) -> Result<Record>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: Some(name),
            f: Arc::new(f),
        }
    }

    /// An anonymous hook; rejected at registration.
    pub fn anonymous<F>(f: F) -> Self
    where
        F: Fn(Record, &mut dyn FnMut(Record) -> Result<Record>) -> Result<Record>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            f: Arc::new(f),
        }
    }

    /// Invoke the hook with the pre-state and the continuation.
    pub fn call(
        &self,
        record: Record,
        next: &mut dyn FnMut(Record) -> Result<Record>,
    ) -> Result<Record> {
        (self.f)(record, next)
    }
}

struct ScopedHook<F> {
    scope: HookScope,
    f: F,
}

/// All hooks registered for one resource, grouped by lifecycle point.
#[derive(Default)]
pub struct HookSet {
    before_attributes: Vec<ScopedHook<RawAttrsHookFn>>,
    after_attributes: Vec<ScopedHook<RecordHookFn>>,
    before_save: Vec<ScopedHook<RecordHookFn>>,
    after_save: Vec<ScopedHook<RecordHookFn>>,
    before_destroy: Vec<RecordHookFn>,
    after_destroy: Vec<RecordHookFn>,
    around_attributes: Option<(HookScope, AroundAttributesHook)>,
    around_save: Option<(HookScope, AroundSaveHook)>,
    around_destroy: Option<AroundDestroyHook>,
}

impl HookSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_before_attributes(&mut self, scope: HookScope, f: RawAttrsHookFn) {
        self.before_attributes.push(ScopedHook { scope, f });
    }

    pub(crate) fn add_after_attributes(&mut self, scope: HookScope, f: RecordHookFn) {
        self.after_attributes.push(ScopedHook { scope, f });
    }

    pub(crate) fn add_before_save(&mut self, scope: HookScope, f: RecordHookFn) {
        self.before_save.push(ScopedHook { scope, f });
    }

    pub(crate) fn add_after_save(&mut self, scope: HookScope, f: RecordHookFn) {
        self.after_save.push(ScopedHook { scope, f });
    }

    pub(crate) fn add_before_destroy(&mut self, f: RecordHookFn) {
        self.before_destroy.push(f);
    }

    pub(crate) fn add_after_destroy(&mut self, f: RecordHookFn) {
        self.after_destroy.push(f);
    }

    pub(crate) fn set_around_attributes(
        &mut self,
        resource: &str,
        scope: HookScope,
        hook: AroundAttributesHook,
    ) -> std::result::Result<(), ConfigError> {
        if hook.name().is_none() {
            return Err(ConfigError::AnonymousAroundHook {
                resource: resource.to_string(),
                point: HookPoint::AroundAttributes,
            });
        }
        if let Some((_, existing)) = &self.around_attributes {
            return Err(ConfigError::DuplicateAroundHook {
                resource: resource.to_string(),
                point: HookPoint::AroundAttributes,
                existing: existing.name().unwrap_or("<unnamed>").to_string(),
            });
        }
        self.around_attributes = Some((scope, hook));
        Ok(())
    }

    pub(crate) fn set_around_save(
        &mut self,
        resource: &str,
        scope: HookScope,
        hook: AroundSaveHook,
    ) -> std::result::Result<(), ConfigError> {
        if hook.name().is_none() {
            return Err(ConfigError::AnonymousAroundHook {
                resource: resource.to_string(),
                point: HookPoint::AroundSave,
            });
        }
        if let Some((_, existing)) = &self.around_save {
            return Err(ConfigError::DuplicateAroundHook {
                resource: resource.to_string(),
                point: HookPoint::AroundSave,
                existing: existing.name().unwrap_or("<unnamed>").to_string(),
            });
        }
        self.around_save = Some((scope, hook));
        Ok(())
    }

    pub(crate) fn set_around_destroy(
        &mut self,
        resource: &str,
        hook: AroundDestroyHook,
    ) -> std::result::Result<(), ConfigError> {
        if hook.name().is_none() {
            return Err(ConfigError::AnonymousAroundHook {
                resource: resource.to_string(),
                point: HookPoint::AroundDestroy,
            });
        }
        if let Some(existing) = &self.around_destroy {
            return Err(ConfigError::DuplicateAroundHook {
                resource: resource.to_string(),
                point: HookPoint::AroundDestroy,
                existing: existing.name().unwrap_or("<unnamed>").to_string(),
            });
        }
        self.around_destroy = Some(hook);
        Ok(())
    }

    /// Run before_attributes hooks for `action`, in registration order.
    pub fn run_before_attributes(&self, action: Action, attrs: &mut RawAttributes) -> Result<()> {
        for hook in &self.before_attributes {
            if hook.scope.applies_to(action) {
                (hook.f)(attrs)?;
            }
        }
        Ok(())
    }

    /// Run after_attributes hooks for `action`, in registration order.
    pub fn run_after_attributes(&self, action: Action, record: &mut Record) -> Result<()> {
        for hook in &self.after_attributes {
            if hook.scope.applies_to(action) {
                (hook.f)(record)?;
            }
        }
        Ok(())
    }

    /// Run before_save hooks for `action`, in registration order.
    pub fn run_before_save(&self, action: Action, record: &mut Record) -> Result<()> {
        for hook in &self.before_save {
            if hook.scope.applies_to(action) {
                (hook.f)(record)?;
            }
        }
        Ok(())
    }

    /// Run after_save hooks for `action`, in registration order.
    pub fn run_after_save(&self, action: Action, record: &mut Record) -> Result<()> {
        for hook in &self.after_save {
            if hook.scope.applies_to(action) {
                (hook.f)(record)?;
            }
        }
        Ok(())
    }

    /// Run before_destroy hooks in registration order.
    pub fn run_before_destroy(&self, record: &mut Record) -> Result<()> {
        for hook in &self.before_destroy {
            hook(record)?;
        }
        Ok(())
    }

    /// Run after_destroy hooks in registration order.
    pub fn run_after_destroy(&self, record: &mut Record) -> Result<()> {
        for hook in &self.after_destroy {
            hook(record)?;
        }
        Ok(())
    }

    /// The around_attributes hook, if one is registered and in scope.
    #[must_use]
    pub fn around_attributes(&self, action: Action) -> Option<&AroundAttributesHook> {
        match &self.around_attributes {
            Some((scope, hook)) if scope.applies_to(action) => Some(hook),
            _ => None,
        }
    }

    /// The around_save hook, if one is registered and in scope.
    #[must_use]
    pub fn around_save(&self, action: Action) -> Option<&AroundSaveHook> {
        match &self.around_save {
            Some((scope, hook)) if scope.applies_to(action) => Some(hook),
            _ => None,
        }
    }

    /// The around_destroy hook, if one is registered.
    #[must_use]
    pub fn around_destroy(&self) -> Option<&AroundDestroyHook> {
        self.around_destroy.as_ref()
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("before_attributes", &self.before_attributes.len())
            .field("after_attributes", &self.after_attributes.len())
            .field("before_save", &self.before_save.len())
            .field("after_save", &self.after_save.len())
            .field("before_destroy", &self.before_destroy.len())
            .field("after_destroy", &self.after_destroy.len())
            .field("around_attributes", &self.around_attributes.is_some())
            .field("around_save", &self.around_save.is_some())
            .field("around_destroy", &self.around_destroy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_scope_applies_to() {
        assert!(HookScope::Both.applies_to(Action::Create));
        assert!(HookScope::Both.applies_to(Action::Update));
        assert!(!HookScope::Both.applies_to(Action::Destroy));
        assert!(HookScope::CreateOnly.applies_to(Action::Create));
        assert!(!HookScope::CreateOnly.applies_to(Action::Update));
        assert!(HookScope::UpdateOnly.applies_to(Action::Update));
    }

    #[test]
    fn test_before_hooks_run_in_registration_order() {
        let mut set = HookSet::new();
        set.add_before_save(
            HookScope::Both,
            Arc::new(|record| {
                record.set("order", Value::Text("first".into()));
                Ok(())
            }),
        );
        set.add_before_save(
            HookScope::Both,
            Arc::new(|record| {
                let prior = record.get("order").and_then(Value::as_str).unwrap_or("");
                record.set("order", Value::Text(format!("{prior},second")));
                Ok(())
            }),
        );

        let mut record = Record::new("things");
        set.run_before_save(Action::Create, &mut record).unwrap();
        assert_eq!(
            record.get("order").and_then(Value::as_str),
            Some("first,second")
        );
    }

    #[test]
    fn test_scoped_hook_skipped_for_other_action() {
        let mut set = HookSet::new();
        set.add_before_save(
            HookScope::UpdateOnly,
            Arc::new(|record| {
                record.set("touched", Value::Bool(true));
                Ok(())
            }),
        );
        let mut record = Record::new("things");
        set.run_before_save(Action::Create, &mut record).unwrap();
        assert!(!record.has("touched"));
        set.run_before_save(Action::Update, &mut record).unwrap();
        assert!(record.has("touched"));
    }

    #[test]
    fn test_anonymous_around_hook_rejected() {
        let mut set = HookSet::new();
        let err = set
            .set_around_save(
                "things",
                HookScope::Both,
                AroundSaveHook::anonymous(|record, next| next(record)),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::AnonymousAroundHook { .. }));
        assert!(err.to_string().contains("around_save"));
    }

    #[test]
    fn test_duplicate_around_hook_rejected() {
        let mut set = HookSet::new();
        set.set_around_save(
            "things",
            HookScope::Both,
            AroundSaveHook::named("audit", |record, next| next(record)),
        )
        .unwrap();
        let err = set
            .set_around_save(
                "things",
                HookScope::Both,
                AroundSaveHook::named("second", |record, next| next(record)),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAroundHook { .. }));
        assert!(err.to_string().contains("audit"));
    }

    #[test]
    fn test_around_hook_transforms_continuation_result() {
        let mut set = HookSet::new();
        set.set_around_save(
            "things",
            HookScope::Both,
            AroundSaveHook::named("stamp", |mut record, next| {
                record.set("pre", Value::Bool(true));
                let mut saved = next(record)?;
                saved.set("post", Value::Bool(true));
                Ok(saved)
            }),
        )
        .unwrap();

        let hook = set.around_save(Action::Create).unwrap();
        let mut op = |mut record: Record| {
            // The continuation sees the pre-mutation.
            assert!(record.has("pre"));
            record.set("id", Value::Int(1));
            Ok(record)
        };
        let saved = hook.call(Record::new("things"), &mut op).unwrap();
        assert!(saved.has("post"));
        assert_eq!(saved.id(), Some(&Value::Int(1)));
    }

    #[test]
    fn test_around_hook_out_of_scope_is_none() {
        let mut set = HookSet::new();
        set.set_around_save(
            "things",
            HookScope::CreateOnly,
            AroundSaveHook::named("create_only", |record, next| next(record)),
        )
        .unwrap();
        assert!(set.around_save(Action::Create).is_some());
        assert!(set.around_save(Action::Update).is_none());
    }
}
