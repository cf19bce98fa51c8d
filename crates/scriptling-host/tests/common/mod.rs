// Shared helpers for the host integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use scriptling_host::events::{ChatEvent, Payload};
use scriptling_host::{
    DispatchConfig, DispatchEngine, FnSource, ModuleApi, ModuleManager, ModuleMetadata,
    ModuleSource, init,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn clear(log: &Log) {
    log.lock().unwrap().clear();
}

pub fn host() -> (DispatchEngine, ModuleManager) {
    init(DispatchConfig::default())
}

pub fn source<F>(name: &str, entry: F) -> Arc<dyn ModuleSource>
where
    F: Fn(&ModuleApi) -> anyhow::Result<()> + Send + Sync + 'static,
{
    FnSource::new(ModuleMetadata::new(name).with_version("1.0.0"), entry).into_source()
}

pub fn chat(text: &str) -> Payload {
    Payload::Chat(ChatEvent::plain(text))
}
