#![no_main]

use libfuzzer_sys::fuzz_target;
use roster_animator::config::ScenarioLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        // Must never panic, whatever the input.
        let _ = ScenarioLoader::with_defaults().load_from_str(yaml);
    }
});
