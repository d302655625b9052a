mod settings;

pub use settings::{ReconnectSettings, Settings};
