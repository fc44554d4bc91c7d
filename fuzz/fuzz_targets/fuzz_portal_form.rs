//! Fuzz target: `portal::parse_form`
//!
//! Arbitrary `POST /save` bodies must never panic; an accepted form has
//! every field present and within its stored length.
//!
//! cargo fuzz run fuzz_portal_form

#![no_main]

use greenmesh::adapters::portal::{MAX_FORM_LEN, parse_form};
use libfuzzer_sys::fuzz_target;

use critical_section as _;

fuzz_target!(|data: &[u8]| {
    let body = &data[..data.len().min(MAX_FORM_LEN)];
    if let Ok(creds) = parse_form(body) {
        assert!(!creds.ssid.is_empty());
        assert!(!creds.passphrase.is_empty());
        assert!(!creds.account_id.is_empty());
        assert!(!creds.device_id.is_empty());
        assert!(creds.ssid.len() <= 32);
    }
});
