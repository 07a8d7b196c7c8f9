//! Fuzz target: `SetpointUpdate::validate`
//!
//! Arbitrary JSON bodies must either fail to parse or yield a report in
//! which every accepted value lies inside its parameter's range.
//!
//! cargo fuzz run fuzz_setpoint_update

#![no_main]

use incubator::app::commands::SetpointUpdate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(update) = serde_json::from_slice::<SetpointUpdate>(data) else {
        return;
    };
    let report = update.validate();
    for (parameter, value) in report.accepted() {
        let range = parameter
            .setpoint_range()
            .expect("only setpoint loops appear in a report");
        assert!(value.is_finite() && range.contains(&value));
    }
    assert!(report.accepted().count() + report.rejected().count() <= update.fields().count());
});
