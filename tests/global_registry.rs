// Buses built without a private registry share the process-wide one.
//
// Marked #[serial] since every test here mutates the same global registry.

use magma_msgbus::Bus::Structs::IntMessage;
use magma_msgbus::{MessageBus, TypeRegistry};
use serial_test::serial;

#[test]
#[serial]
fn buses_share_the_global_registry() {
    let a = MessageBus::new(64, 4).unwrap();
    let b = MessageBus::new(128, 8).unwrap();

    let id = a.type_id("global.shared.score");
    assert_ne!(id, 0);
    assert_eq!(b.type_id("global.shared.score"), id);
    assert_eq!(
        TypeRegistry::global().lookup("global.shared.score"),
        Some(id)
    );
    assert!(std::sync::Arc::ptr_eq(a.registry(), b.registry()));
}

#[test]
#[serial]
fn global_ids_grow_monotonically() {
    let registry = TypeRegistry::global();
    let before = registry.len();
    let first = registry.name_to_id("global.monotonic.first");
    let second = registry.name_to_id("global.monotonic.second");
    assert!(second > first);
    assert_eq!(registry.len(), before + 2);
    assert_eq!(registry.id_to_name(second).unwrap(), "global.monotonic.second");
}

#[test]
#[serial]
fn default_bus_geometry() {
    let bus = MessageBus::new(magma_msgbus::Bus::DEFAULT_SLOT_SIZE, magma_msgbus::Bus::DEFAULT_SLOT_COUNT).unwrap();
    assert_eq!(bus.slot_size(), 256);
    assert_eq!(bus.slot_count(), 1024);
    assert_eq!(bus.free_slots(), 1024);

    let listener = bus.listener();
    listener.subscribe("global.geometry").unwrap();
    bus.publish("global.geometry", IntMessage(1)).unwrap();
    println!("Bus Struct: {:#?}", bus);
    println!("Listener Struct: {:#?}", listener);
    println!("Message: {:?}", listener.pop_message());
}
