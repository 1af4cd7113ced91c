use std::sync::Arc;

use library::{Bus, FileSystem};

use crate::config::Config;

/// Everything a command needs from the outside world.
#[derive(Clone)]
pub struct Context {
    pub fs: Arc<dyn FileSystem>,
    pub bus: Arc<dyn Bus>,
    pub config: Config,
}

impl Context {
    pub fn new(fs: Arc<dyn FileSystem>, bus: Arc<dyn Bus>, config: Config) -> Self {
        Self { fs, bus, config }
    }

    pub fn bus(&self) -> &dyn Bus {
        self.bus.as_ref()
    }
}
