mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::strategies::*;
use common::{InvocationLog, RecordingHandler};
use entity_lifecycle::registry::{HandlerRegistry, RegistrationOutcome};
use proptest::prelude::*;

proptest! {
    /// Property: the registry is always sorted by priority with unique names
    #[test]
    fn registry_stays_sorted_and_unique(registrations in registrations_strategy()) {
        let registry = HandlerRegistry::new();
        let log = InvocationLog::new();
        let mut first_priority: HashMap<String, i32> = HashMap::new();

        for (name, priority) in &registrations {
            let outcome = registry.register(Arc::new(RecordingHandler::new(name, *priority, &log)));
            if first_priority.contains_key(name) {
                prop_assert_eq!(outcome, RegistrationOutcome::Duplicate);
            } else {
                prop_assert_eq!(outcome, RegistrationOutcome::Registered);
                first_priority.insert(name.clone(), *priority);
            }
        }

        let handlers = registry.list();
        prop_assert_eq!(handlers.len(), first_priority.len());
        prop_assert_eq!(registry.count(), first_priority.len());

        for pair in handlers.windows(2) {
            prop_assert!(pair[0].descriptor.priority <= pair[1].descriptor.priority);
        }

        // First registration wins
        for registered in handlers.iter() {
            prop_assert_eq!(first_priority[registered.name()], registered.descriptor.priority);
        }
    }

    /// Property: unregistering removes exactly the named handler and keeps order
    #[test]
    fn unregister_preserves_order(
        registrations in registrations_strategy(),
        victim in handler_name_strategy(),
    ) {
        let registry = HandlerRegistry::new();
        let log = InvocationLog::new();
        for (name, priority) in &registrations {
            registry.register(Arc::new(RecordingHandler::new(name, *priority, &log)));
        }

        let before: Vec<String> = registry.names();
        let removed = registry.unregister(&victim);
        let after: Vec<String> = registry.names();

        prop_assert_eq!(removed, before.contains(&victim));
        let expected: Vec<String> = before.into_iter().filter(|name| *name != victim).collect();
        prop_assert_eq!(after, expected);
    }
}
