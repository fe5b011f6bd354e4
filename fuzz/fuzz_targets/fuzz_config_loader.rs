#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = satt_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must always map onto a channel map.
    let kind = satt_core::AttenuatorKind::from(&cfg.device);
    if let Some(prefix) = cfg.device.prefix_or_default() {
        let map = satt_core::ChannelMap::build(kind, prefix, cfg.device.calculator_prefix.as_deref());
        assert!(map.is_ok(), "validated config rejected by channel map: {:?}", map.err());
    }
});
