// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

#![no_main]

use libfuzzer_sys::fuzz_target;
use dmbus::codec::{decode_event, decode_object, decode_properties, decode_property, decode_value};
use dmbus::Message;

// The codec reads typed fields out of a message FIFO, so the fuzz input is
// interpreted as a field script: each chunk of bytes appends one
// i32/f64/string/bytes field.
fn build_message(data: &[u8]) -> Message {
    let mut msg = Message::new();
    let mut it = data.iter().copied();
    while let Some(kind) = it.next() {
        match kind % 4 {
            0 => {
                let mut word = [0u8; 4];
                for byte in &mut word {
                    *byte = it.next().unwrap_or(0);
                }
                msg.push_i32(i32::from_le_bytes(word));
            }
            1 => {
                let mut word = [0u8; 8];
                for byte in &mut word {
                    *byte = it.next().unwrap_or(0);
                }
                msg.push_f64(f64::from_le_bytes(word));
            }
            2 => {
                let len = usize::from(it.next().unwrap_or(0)) % 32;
                // printable ASCII keeps the field valid UTF-8
                let text: String = (&mut it)
                    .take(len)
                    .map(|b| char::from(b % 0x5F + 0x20))
                    .collect();
                msg.push_str(&text);
            }
            _ => {
                let len = usize::from(it.next().unwrap_or(0)) % 32;
                let raw: Vec<u8> = (&mut it).take(len).collect();
                msg.push_bytes(&raw);
            }
        }
    }
    msg
}

fuzz_target!(|data: &[u8]| {
    // Fuzz scalar/legacy value decoding (unknown tags come back as Tlv)
    let _ = decode_value(&mut build_message(data));

    // Fuzz name+value pair decoding
    let _ = decode_property(&mut build_message(data));

    // Fuzz counted property lists (forged counts must fail cleanly)
    let _ = decode_properties(&mut build_message(data));

    // Fuzz recursive object trees (depth is bounded by the field count)
    let _ = decode_object(&mut build_message(data));

    // Fuzz event envelope decoding
    let _ = decode_event(&mut build_message(data));

    // Drain with mismatched pop types; every pop must consume a field
    let mut msg = build_message(data);
    while !msg.is_empty() {
        if msg.pop_str().is_err() && msg.pop_i32().is_err() && msg.pop_f64().is_err() {
            let _ = msg.pop_bytes();
        }
    }
});
