//! Fuzz target: `console::parse_line`
//!
//! Feeds arbitrary UTF-8 into the console parser.  It must never panic,
//! and anything it accepts must execute against a fresh link without
//! panicking either.
//!
//! cargo fuzz run fuzz_console_line

#![no_main]

use incubator::adapters::console::{self, ConsoleError, ConsoleRequest};
use incubator::runtime::ControlLink;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    match console::parse_line(line) {
        Ok(ConsoleRequest::Quit) => {}
        Ok(request) => {
            let link = ControlLink::new();
            let reply = console::execute(request, &link);
            assert!(!reply.is_empty(), "every request gets a reply");
        }
        Err(ConsoleError::Empty) => assert!(line.trim().is_empty()),
        Err(_) => {}
    }
});
