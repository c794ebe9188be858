//! Module registry
//!
//! Populated once at process start and read-only afterwards. Priority
//! ordering is descending, with registration order breaking ties
//! (`sort_by_key` is stable, so sorting on priority alone preserves
//! insertion order among equals).

use crate::module::{Module, ModuleInfo};

type ModuleFactory = Box<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// One registered module: descriptor plus instance factory
pub struct ModuleEntry {
    pub info: ModuleInfo,
    factory: ModuleFactory,
}

impl ModuleEntry {
    /// Create a fresh module instance for a new session
    pub fn instantiate(&self) -> Box<dyn Module> {
        (self.factory)()
    }
}

/// Ordered collection of available system modules
#[derive(Default)]
pub struct Registry {
    entries: Vec<ModuleEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, info: ModuleInfo, factory: F)
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        tracing::debug!(module = info.shortname, priority = info.priority, "registered module");
        self.entries.push(ModuleEntry {
            info,
            factory: Box::new(factory),
        });
    }

    pub fn find_by_name(&self, shortname: &str) -> Option<&ModuleEntry> {
        self.entries.iter().find(|e| e.info.shortname == shortname)
    }

    /// Entries sorted descending by priority, stable by registration
    /// order
    pub fn priority_order(&self) -> Vec<&ModuleEntry> {
        let mut ordered: Vec<&ModuleEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|e| std::cmp::Reverse(e.info.priority));
        ordered
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::espec::EmulateSpec;
    use crate::module::{
        FrameHost, GameType, ModuleCaps, SimpleCommand,
    };
    use crate::state::StateMem;
    use ac_core::StateError;

    struct DummyModule;

    impl Module for DummyModule {
        fn close_game(&mut self) {}
        fn emulate(&mut self, _spec: &mut EmulateSpec, _host: &mut dyn FrameHost) {}
        fn set_input(&mut self, _port: usize, _device: &str, _data: &[u8]) {}
        fn do_simple_command(&mut self, _cmd: SimpleCommand) {}
        fn state_action(
            &mut self,
            _sm: &mut StateMem,
            _load: bool,
        ) -> Result<(), StateError> {
            Ok(())
        }
    }

    fn info(shortname: &'static str, priority: i32) -> ModuleInfo {
        ModuleInfo {
            shortname,
            fullname: "Dummy",
            extensions: &[],
            priority,
            caps: ModuleCaps::FILE_LOAD,
            game_type: GameType::Cartridge,
            nominal_width: 256,
            nominal_height: 240,
            lcm_width: 256,
            lcm_height: 240,
            sound_channels: 2,
            master_clock: 21_477_272,
        }
    }

    #[test]
    fn test_find_by_name() {
        let mut reg = Registry::new();
        reg.register(info("po", 0), || Box::new(DummyModule));
        assert!(reg.find_by_name("po").is_some());
        assert!(reg.find_by_name("xx").is_none());
    }

    #[test]
    fn test_priority_order_descending_and_stable() {
        let mut reg = Registry::new();
        reg.register(info("low", -1), || Box::new(DummyModule));
        reg.register(info("tie_a", 5), || Box::new(DummyModule));
        reg.register(info("high", 9), || Box::new(DummyModule));
        reg.register(info("tie_b", 5), || Box::new(DummyModule));

        let names: Vec<&str> = reg
            .priority_order()
            .iter()
            .map(|e| e.info.shortname)
            .collect();
        assert_eq!(names, ["high", "tie_a", "tie_b", "low"]);
    }
}
