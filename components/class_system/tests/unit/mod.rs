//! Unit tests for the registry, lifecycle machine and dispatch tables

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, OnceLock};
use std::thread;
use std::time::Duration;

use class_system::{
    is_assignable_from, Compiler, Linker, StaticInitializer, TypeDefinition, TypeRegistry,
    TypeSource, TypeStatus,
};
use core_types::{CodePtr, MemberKey, VmError};
use parking_lot::Mutex;

// ============================================================================
// Mock collaborators
// ============================================================================

#[derive(Default)]
struct MapSource {
    defs: Mutex<HashMap<String, TypeDefinition>>,
}

impl MapSource {
    fn insert(&self, name: &str, def: TypeDefinition) {
        self.defs.lock().insert(name.to_string(), def);
    }
}

impl TypeSource for MapSource {
    fn load(&self, name: &str) -> Result<TypeDefinition, VmError> {
        self.defs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::linkage(name, "no definition on the load path"))
    }
}

#[derive(Default)]
struct CountingCompiler {
    compiled: Mutex<HashMap<(String, MemberKey), CodePtr>>,
    next: AtomicUsize,
    initializers: Mutex<HashMap<String, StaticInitializer>>,
}

impl CountingCompiler {
    fn set_initializer(&self, name: &str, initializer: StaticInitializer) {
        self.initializers.lock().insert(name.to_string(), initializer);
    }
}

impl Compiler for CountingCompiler {
    fn entry_point(&self, type_name: &str, member: &MemberKey) -> Result<CodePtr, VmError> {
        let mut compiled = self.compiled.lock();
        let key = (type_name.to_string(), member.clone());
        Ok(*compiled.entry(key).or_insert_with(|| {
            CodePtr::new(0x1000 + 8 * self.next.fetch_add(1, Ordering::Relaxed))
        }))
    }

    fn static_initializer(&self, type_name: &str) -> Option<StaticInitializer> {
        self.initializers.lock().get(type_name).cloned()
    }
}

fn linker_with(defs: Vec<(&str, TypeDefinition)>) -> (Arc<Linker>, Arc<CountingCompiler>) {
    let source = MapSource::default();
    for (name, def) in defs {
        source.insert(name, def);
    }
    let compiler = Arc::new(CountingCompiler::default());
    let linker = Arc::new(Linker::new(
        Arc::new(TypeRegistry::new()),
        Arc::new(source),
        compiler.clone(),
    ));
    (linker, compiler)
}

// ============================================================================
// Registry concurrency
// ============================================================================

#[test]
fn test_concurrent_lookup_or_create_is_unique() {
    let registry = Arc::new(TypeRegistry::new());
    let barrier = Arc::new(Barrier::new(8));

    thread::scope(|s| {
        for _ in 0..8 {
            let registry = registry.clone();
            let barrier = barrier.clone();
            s.spawn(move || {
                barrier.wait();
                for round in 0..100 {
                    let name = format!("Type{}", round % 10);
                    let ty = registry.lookup_or_create(&name);
                    assert_eq!(ty.name(), name);
                    // Everyone must see the same handle for the same name.
                    assert_eq!(registry.lookup(&name).unwrap().id(), ty.id());
                }
            });
        }
    });

    assert_eq!(registry.len(), 10);
}

// ============================================================================
// Lifecycle concurrency
// ============================================================================

#[test]
fn test_concurrent_ensure_ready_initializes_once() {
    let (linker, compiler) = linker_with(vec![("Shared", TypeDefinition::class())]);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    compiler.set_initializer(
        "Shared",
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            // Widen the race window.
            thread::sleep(Duration::from_millis(20));
            Ok(())
        }),
    );

    let ty = linker.type_named("Shared");
    let barrier = Arc::new(Barrier::new(8));
    thread::scope(|s| {
        for _ in 0..8 {
            let linker = linker.clone();
            let barrier = barrier.clone();
            let id = ty.id();
            s.spawn(move || {
                barrier.wait();
                linker.ensure_ready(id).unwrap();
                // Nobody returns before the type is ready.
                assert_eq!(linker.registry().get(id).status(), TypeStatus::Ready);
            });
        }
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_failure_is_observed_by_all() {
    let (linker, compiler) = linker_with(vec![("Doomed", TypeDefinition::class())]);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    compiler.set_initializer(
        "Doomed",
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Err(VmError::linkage("Doomed", "static initializer exploded"))
        }),
    );

    let ty = linker.type_named("Doomed");
    let barrier = Arc::new(Barrier::new(8));
    let failures = Arc::new(AtomicUsize::new(0));
    thread::scope(|s| {
        for _ in 0..8 {
            let linker = linker.clone();
            let barrier = barrier.clone();
            let failures = failures.clone();
            let id = ty.id();
            s.spawn(move || {
                barrier.wait();
                assert!(linker.ensure_ready(id).is_err());
                failures.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    assert_eq!(failures.load(Ordering::SeqCst), 8);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(ty.status(), TypeStatus::Erroneous);
}

#[test]
fn test_reentrant_initialization_returns_immediately() {
    let (linker, compiler) = linker_with(vec![("Recursive", TypeDefinition::class())]);
    let runs = Arc::new(AtomicUsize::new(0));
    let linker_slot: Arc<OnceLock<Arc<Linker>>> = Arc::new(OnceLock::new());

    let counter = runs.clone();
    let slot = linker_slot.clone();
    compiler.set_initializer(
        "Recursive",
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let linker = slot.get().expect("linker registered").clone();
            let ty = linker.registry().lookup("Recursive").expect("exists");
            // Transitively re-triggering our own initialization must return
            // immediately instead of deadlocking or re-running.
            linker.ensure_ready(ty.id())
        }),
    );
    linker_slot.set(linker.clone()).ok();

    let ty = linker.type_named("Recursive");
    linker.ensure_ready(ty.id()).unwrap();
    assert_eq!(ty.status(), TypeStatus::Ready);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subtype_never_ready_before_super() {
    let (linker, compiler) = linker_with(vec![
        ("Base", TypeDefinition::class()),
        ("Derived", TypeDefinition::class().with_super("Base")),
    ]);
    let linker_slot: Arc<OnceLock<Arc<Linker>>> = Arc::new(OnceLock::new());

    compiler.set_initializer(
        "Base",
        Arc::new(|| {
            thread::sleep(Duration::from_millis(20));
            Ok(())
        }),
    );
    let slot = linker_slot.clone();
    compiler.set_initializer(
        "Derived",
        Arc::new(move || {
            let linker = slot.get().expect("linker registered");
            let base = linker.registry().lookup("Base").expect("exists");
            assert_eq!(base.status(), TypeStatus::Ready, "super not ready first");
            Ok(())
        }),
    );
    linker_slot.set(linker.clone()).ok();

    let derived = linker.type_named("Derived");
    let barrier = Arc::new(Barrier::new(4));
    thread::scope(|s| {
        for _ in 0..4 {
            let linker = linker.clone();
            let barrier = barrier.clone();
            let id = derived.id();
            s.spawn(move || {
                barrier.wait();
                linker.ensure_ready(id).unwrap();
            });
        }
    });
    assert_eq!(derived.status(), TypeStatus::Ready);
}

// ============================================================================
// Dispatch tables and subtyping
// ============================================================================

#[test]
fn test_override_keeps_slot_and_rebinds_code() {
    let (linker, _) = linker_with(vec![
        (
            "Base",
            TypeDefinition::class()
                .with_method("run", "()V")
                .with_method("describe", "()Ljava/lang/String;"),
        ),
        (
            "Derived",
            TypeDefinition::class()
                .with_super("Base")
                .with_method("run", "()V")
                .with_method("extra", "()V"),
        ),
    ]);

    let derived = linker.type_named("Derived");
    linker.resolve(derived.id()).unwrap();
    let base = linker.registry().lookup("Base").unwrap();

    let base_table = base.dispatch_table().unwrap();
    let derived_table = derived.dispatch_table().unwrap();
    let run = MemberKey::new("run", "()V");
    let describe = MemberKey::new("describe", "()Ljava/lang/String;");

    // A slot index never moves in a subtype.
    assert_eq!(base_table.slot_of(&run), derived_table.slot_of(&run));
    assert_eq!(base_table.slot_of(&describe), derived_table.slot_of(&describe));
    assert_eq!(derived_table.len(), base_table.len() + 1);

    // Overridden slot is rebound, inherited slot keeps the super's code.
    let run_slot = base_table.slot_of(&run).unwrap();
    assert_ne!(base_table.code_at(run_slot), derived_table.code_at(run_slot));
    let describe_slot = base_table.slot_of(&describe).unwrap();
    assert_eq!(
        base_table.code_at(describe_slot),
        derived_table.code_at(describe_slot)
    );

    // The appended member records its offset on the declaring type.
    let extra = derived
        .members()
        .unwrap()
        .method(&MemberKey::new("extra", "()V"))
        .unwrap();
    assert_eq!(extra.slot(), Some(base_table.len()));
}

#[test]
fn test_abstract_slot_has_no_code() {
    let (linker, _) = linker_with(vec![
        (
            "Shape",
            TypeDefinition::class().with_abstract_method("area", "()D"),
        ),
        (
            "Circle",
            TypeDefinition::class()
                .with_super("Shape")
                .with_method("area", "()D"),
        ),
    ]);

    let circle = linker.type_named("Circle");
    linker.resolve(circle.id()).unwrap();
    let shape = linker.registry().lookup("Shape").unwrap();

    let area = MemberKey::new("area", "()D");
    let slot = shape.dispatch_table().unwrap().slot_of(&area).unwrap();
    assert_eq!(shape.dispatch_table().unwrap().code_at(slot), None);
    assert!(circle.dispatch_table().unwrap().code_at(slot).is_some());
}

#[test]
fn test_display_hit_and_secondary_scan() {
    let (linker, _) = linker_with(vec![
        ("Comparable", TypeDefinition::interface()),
        (
            "Number",
            TypeDefinition::class()
                .with_interface("Comparable")
                .with_method("intValue", "()I"),
        ),
        (
            "Integer",
            TypeDefinition::class()
                .with_super("Number")
                .with_method("intValue", "()I"),
        ),
    ]);

    let integer = linker.type_named("Integer");
    linker.resolve(integer.id()).unwrap();
    let registry = linker.registry();
    let number = registry.lookup("Number").unwrap();
    let comparable = registry.lookup("Comparable").unwrap();

    // Single-inheritance chain: one indexed display read.
    let number_depth = number.dispatch_table().unwrap().depth();
    let integer_table = integer.dispatch_table().unwrap();
    assert!(integer_table.extends(number.id(), number_depth));
    assert_eq!(integer_table.display()[number_depth], number.id());

    assert!(is_assignable_from(registry, number.id(), integer.id()).unwrap());
    assert!(is_assignable_from(registry, integer.id(), integer.id()).unwrap());
    assert!(!is_assignable_from(registry, integer.id(), number.id()).unwrap());

    // Interface reached only through the ancestor: secondary scan.
    assert!(!integer_table.extends(comparable.id(), 0));
    assert!(integer_table.implements(comparable.id()));
    assert!(is_assignable_from(registry, comparable.id(), integer.id()).unwrap());
    assert!(is_assignable_from(registry, comparable.id(), number.id()).unwrap());
}

#[test]
fn test_extended_interfaces_become_secondaries() {
    let (linker, _) = linker_with(vec![
        ("Closeable", TypeDefinition::interface()),
        (
            "Channel",
            TypeDefinition::interface().with_interface("Closeable"),
        ),
        (
            "Socket",
            TypeDefinition::class().with_interface("Channel"),
        ),
    ]);

    let socket = linker.type_named("Socket");
    linker.resolve(socket.id()).unwrap();
    let registry = linker.registry();
    let channel = registry.lookup("Channel").unwrap();
    let closeable = registry.lookup("Closeable").unwrap();

    let table = socket.dispatch_table().unwrap();
    assert!(table.implements(channel.id()));
    assert!(table.implements(closeable.id()));
    assert!(is_assignable_from(registry, closeable.id(), socket.id()).unwrap());

    // Interfaces are their own display; their supertyping is secondary.
    assert_eq!(channel.dispatch_table().unwrap().depth(), 0);
    assert!(channel.dispatch_table().unwrap().implements(closeable.id()));
}

#[test]
fn test_unresolved_type_cannot_be_subtype_tested() {
    let (linker, _) = linker_with(vec![("Late", TypeDefinition::class())]);
    let late = linker.type_named("Late");
    let err = is_assignable_from(linker.registry(), late.id(), late.id());
    assert!(matches!(err, Err(VmError::Linkage { .. })));
}
