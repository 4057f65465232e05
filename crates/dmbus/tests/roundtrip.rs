// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! End-to-end provider/consumer tests over the in-process transport:
//! reads, writes, wildcards, discovery, and write sessions.

use dmbus::{
    codec, Bus, Config, DataElement, Error, Handle, LocalTransport, Message, Property,
    PropertyHandlers, SetHandler, SetOptions, TimeVal, Transport, Value,
};
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

struct SampleProvider {
    handle: Handle,
    model: Arc<Mutex<String>>,
    alpha: Arc<Mutex<String>>,
}

/// A provider with one of everything: readable, writable, write-only,
/// failing, and event elements under `Device.Sample.`.
fn open_sample_provider(bus: &Bus) -> SampleProvider {
    let handle = bus
        .open("test.sample.provider")
        .expect("Failed to open provider");

    let model = Arc::new(Mutex::new(String::from("X-2000")));
    let alpha = Arc::new(Mutex::new(String::new()));

    let model_get = Arc::clone(&model);
    let model_set = Arc::clone(&model);
    let alpha_get = Arc::clone(&alpha);
    let alpha_set = Arc::clone(&alpha);
    let secret_set: SetHandler = Arc::new(|_, _, _| Ok(()));

    handle
        .register_data_elements(&[
            DataElement::object("Device.Sample."),
            DataElement::property(
                "Device.Sample.Model",
                PropertyHandlers::read_write(
                    move |_, _, _| Ok(Value::String(model_get.lock().clone())),
                    move |_, prop, _| match prop.value.as_str() {
                        Some(s) => {
                            *model_set.lock() = s.to_string();
                            Ok(())
                        }
                        None => Err(Error::InvalidInput),
                    },
                ),
            ),
            DataElement::property(
                "Device.Sample.Serial",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::String("SN-001".into()))),
            ),
            DataElement::property(
                "Device.Sample.Uptime",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::U32(42))),
            ),
            DataElement::property(
                "Device.Sample.Alpha",
                PropertyHandlers::read_write(
                    move |_, _, _| Ok(Value::String(alpha_get.lock().clone())),
                    move |_, prop, _| match prop.value.as_str() {
                        Some(s) => {
                            *alpha_set.lock() = s.to_string();
                            Ok(())
                        }
                        None => Err(Error::InvalidInput),
                    },
                ),
            ),
            DataElement::property(
                "Device.Sample.Cranky",
                PropertyHandlers::read_write(
                    |_, _, _| Ok(Value::Bool(false)),
                    |_, _, _| Err(Error::Bus),
                ),
            ),
            DataElement::property(
                "Device.Sample.Secret",
                PropertyHandlers {
                    set: Some(secret_set),
                    ..PropertyHandlers::default()
                },
            ),
            DataElement::property(
                "Device.Sample.Flaky",
                PropertyHandlers::read_only(|_, _, _| Err(Error::Bus)),
            ),
            DataElement::event("Device.Sample.Started!"),
        ])
        .expect("Failed to register elements");

    SampleProvider {
        handle,
        model,
        alpha,
    }
}

#[test]
fn test_get_single_parameter() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let model = consumer
        .get_string("Device.Sample.Model")
        .expect("Failed to get model");
    assert_eq!(model, "X-2000");

    let uptime = consumer
        .get("Device.Sample.Uptime")
        .expect("Failed to get uptime");
    assert_eq!(uptime, Value::U32(42));
    assert_eq!(uptime.as_u32(), Some(42));
}

#[test]
fn test_get_unknown_paths() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    // routes to the provider but is not registered there
    let err = consumer
        .get("Device.Sample.Missing")
        .expect_err("Unregistered name must fail");
    assert_eq!(err, Error::ElementDoesNotExist);

    // routes nowhere at all
    let err = consumer
        .get("Device.Nowhere.At.All")
        .expect_err("Unrouted name must fail");
    assert_eq!(err, Error::Bus);
}

#[test]
fn test_get_type_mismatch() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let err = consumer
        .get_i32("Device.Sample.Model")
        .expect_err("String parameter is not an int32");
    assert_eq!(err, Error::InvalidInput);

    let err = consumer
        .get_string("Device.Sample.Uptime")
        .expect_err("Uint32 parameter is not a string");
    assert_eq!(err, Error::InvalidInput);
}

#[test]
fn test_get_rejects_malformed_and_wildcard_names() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    assert_eq!(consumer.get("").expect_err("Empty name"), Error::InvalidInput);
    assert_eq!(
        consumer
            .get("Device.Sample.Started!")
            .expect_err("Event name in a get"),
        Error::InvalidInput
    );
    // wildcards need get_multiple
    assert_eq!(
        consumer
            .get("Device.Sample.")
            .expect_err("Partial path in single get"),
        Error::AccessNotAllowed
    );
}

#[test]
fn test_set_and_read_back() {
    let bus = Bus::local();
    let provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    consumer
        .set_string("Device.Sample.Model", "B-100")
        .expect("Failed to set model");
    assert_eq!(provider.model.lock().as_str(), "B-100");
    assert_eq!(
        consumer
            .get_string("Device.Sample.Model")
            .expect("Failed to get model"),
        "B-100"
    );
}

#[test]
fn test_set_read_only_rejected() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let err = consumer
        .set_string("Device.Sample.Serial", "SN-999")
        .expect_err("Read-only parameter must refuse a set");
    assert_eq!(err, Error::AccessNotAllowed);
}

#[test]
fn test_set_batch_stops_at_first_failure_without_rollback() {
    let bus = Bus::local();
    let provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let err = consumer
        .set_multiple(
            &[
                Property::new("Device.Sample.Alpha", Value::String("applied".into())),
                Property::new("Device.Sample.Cranky", Value::Bool(true)),
                Property::new("Device.Sample.Model", Value::String("never".into())),
            ],
            &SetOptions::default(),
        )
        .expect_err("Failing handler must fail the batch");
    assert_eq!(err, Error::Bus);

    // the value before the failure stayed applied, the one after was never
    // attempted
    assert_eq!(provider.alpha.lock().as_str(), "applied");
    assert_eq!(provider.model.lock().as_str(), "X-2000");
}

#[test]
fn test_set_commit_flag_tolerates_multibyte_text() {
    let transport = LocalTransport::new();
    let bus = Bus::with_transport(transport.clone(), Config::default());
    let provider = open_sample_provider(&bus);

    // hand-rolled request: a foreign stack may put arbitrary text in the
    // commit field, including a multibyte char straddling the fourth byte
    let mut request = Message::new();
    request.push_i32(0);
    request.push_str("test.foreign.stack");
    request.push_i32(1);
    codec::encode_property(
        &mut request,
        &Property::new("Device.Sample.Model", Value::String("B-200".into())),
    );
    request.push_str("tru\u{2122}");

    let mut response = transport
        .invoke(
            "Device.Sample.Model",
            "SetParameterValues",
            request,
            Duration::from_secs(5),
        )
        .expect("Failed to invoke set");
    assert_eq!(response.pop_i32().expect("Result code"), 0);
    assert_eq!(provider.model.lock().as_str(), "B-200");
}

/// The commit flag travels through the wire to set handlers: a staged
/// batch arrives with commit clear, a plain write with commit set.
#[test]
fn test_set_commit_flag_reaches_handlers() {
    let bus = Bus::local();
    let provider = bus
        .open("test.staging.provider")
        .expect("Failed to open provider");
    let commits: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&commits);
    let second = Arc::clone(&commits);
    provider
        .register_data_elements(&[
            DataElement::object("Device.Staging."),
            DataElement::property(
                "Device.Staging.One",
                PropertyHandlers::read_write(
                    |_, _, _| Ok(Value::I32(0)),
                    move |_, _, opts| {
                        first.lock().push(opts.commit);
                        Ok(())
                    },
                ),
            ),
            DataElement::property(
                "Device.Staging.Two",
                PropertyHandlers::read_write(
                    |_, _, _| Ok(Value::I32(0)),
                    move |_, _, opts| {
                        second.lock().push(opts.commit);
                        Ok(())
                    },
                ),
            ),
        ])
        .expect("Failed to register elements");

    let consumer = bus.open("test.consumer").expect("Failed to open consumer");
    consumer
        .set_multiple(
            &[
                Property::new("Device.Staging.One", Value::I32(1)),
                Property::new("Device.Staging.Two", Value::I32(2)),
            ],
            &SetOptions {
                commit: false,
                ..SetOptions::default()
            },
        )
        .expect("Failed to stage batch");
    assert_eq!(commits.lock().as_slice(), [false, false]);

    consumer
        .set_i32("Device.Staging.One", 3)
        .expect("Failed to set");
    assert_eq!(commits.lock().as_slice(), [false, false, true]);
}

#[test]
fn test_flat_batch_get_aborts_on_first_failure() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let err = consumer
        .get_multiple(&["Device.Sample.Model", "Device.Sample.Flaky"])
        .expect_err("Failing handler must abort the batch");
    assert_eq!(err, Error::Bus);

    let err = consumer
        .get_multiple(&["Device.Sample.Model", "Device.Sample.Missing"])
        .expect_err("Unknown name must abort the batch");
    assert_eq!(err, Error::ElementDoesNotExist);

    let err = consumer
        .get_multiple(&["Device.Sample.Model", "Device.Sample.Started!"])
        .expect_err("Event element must abort the batch");
    assert_eq!(err, Error::InvalidInput);

    // the client side refuses to build a mixed batch
    let err = consumer
        .get_multiple(&["Device.Sample.Model", "Device.Sample."])
        .expect_err("Wildcard in a batch");
    assert_eq!(err, Error::InvalidInput);
}

#[test]
fn test_wildcard_get_collects_readable_properties() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let props = consumer
        .get_multiple(&["Device.Sample."])
        .expect("Failed to expand partial path");
    let mut names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    // write-only, failing, and event elements are invisible
    assert_eq!(
        names,
        vec![
            "Device.Sample.Alpha",
            "Device.Sample.Cranky",
            "Device.Sample.Model",
            "Device.Sample.Serial",
            "Device.Sample.Uptime",
        ]
    );

    let star = consumer
        .get_multiple(&["Device.Sample.*"])
        .expect("Failed to expand star pattern");
    assert_eq!(star.len(), props.len());
}

#[test]
fn test_wildcard_get_takes_over_mixed_batch() {
    let transport = LocalTransport::new();
    let bus = Bus::with_transport(transport.clone(), Config::default());
    let _provider = open_sample_provider(&bus);

    // a foreign stack may mix concrete names with a partial path in one
    // request; the expansion answers for the whole batch
    let mut request = Message::new();
    request.push_str("test.foreign.stack");
    request.push_i32(2);
    request.push_str("Device.Sample.Model");
    request.push_str("Device.Sample.");

    let mut response = transport
        .invoke(
            "Device.Sample.Model",
            "GetParameterValues",
            request,
            Duration::from_secs(5),
        )
        .expect("Failed to invoke get");
    assert_eq!(response.pop_i32().expect("Result code"), 0);
    let props = codec::decode_properties(&mut response).expect("Failed to decode properties");
    let mut names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "Device.Sample.Alpha",
            "Device.Sample.Cranky",
            "Device.Sample.Model",
            "Device.Sample.Serial",
            "Device.Sample.Uptime",
        ]
    );
}

#[test]
fn test_wildcard_get_spans_components() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let other = bus.open("test.other.provider").expect("Failed to open");
    other
        .register_data_elements(&[
            DataElement::object("Device.Other."),
            DataElement::property(
                "Device.Other.Thing",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::I32(7))),
            ),
        ])
        .expect("Failed to register");

    let consumer = bus.open("test.consumer").expect("Failed to open consumer");
    let props = consumer
        .get_multiple(&["Device."])
        .expect("Failed to expand across components");
    assert_eq!(props.len(), 6);
    assert!(props.iter().any(|p| p.name == "Device.Other.Thing"));
    assert!(props.iter().any(|p| p.name == "Device.Sample.Model"));
}

#[test]
fn test_wildcard_with_no_match_reports_missing_element() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let err = consumer
        .get_multiple(&["Device.Sample.Nothing."])
        .expect_err("Unmatched partial path must fail");
    assert_eq!(err, Error::ElementDoesNotExist);
}

#[test]
fn test_scalar_types_roundtrip() {
    let bus = Bus::local();
    let provider = bus.open("test.types.provider").expect("Failed to open");
    provider
        .register_data_elements(&[
            DataElement::object("Device.Types."),
            DataElement::property(
                "Device.Types.Big",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::I64(0x0102_0304_0506_0708))),
            ),
            DataElement::property(
                "Device.Types.Huge",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::U64(u64::MAX - 1))),
            ),
            DataElement::property(
                "Device.Types.Ratio",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::Single(1.5))),
            ),
            DataElement::property(
                "Device.Types.Precise",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::Double(-2.5))),
            ),
            DataElement::property(
                "Device.Types.Blob",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::Bytes(vec![0, 1, 2, 255]))),
            ),
            DataElement::property(
                "Device.Types.Born",
                PropertyHandlers::read_only(|_, _, _| {
                    Ok(Value::DateTime(TimeVal::new(1_700_000_000, 500_000)))
                }),
            ),
            DataElement::property(
                "Device.Types.Neg",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::I16(-5))),
            ),
            DataElement::property(
                "Device.Types.Wide",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::U16(65535))),
            ),
        ])
        .expect("Failed to register");

    let consumer = bus.open("test.consumer").expect("Failed to open consumer");
    let cases = [
        ("Device.Types.Big", Value::I64(0x0102_0304_0506_0708)),
        ("Device.Types.Huge", Value::U64(u64::MAX - 1)),
        ("Device.Types.Ratio", Value::Single(1.5)),
        ("Device.Types.Precise", Value::Double(-2.5)),
        ("Device.Types.Blob", Value::Bytes(vec![0, 1, 2, 255])),
        (
            "Device.Types.Born",
            Value::DateTime(TimeVal::new(1_700_000_000, 500_000)),
        ),
        ("Device.Types.Neg", Value::I16(-5)),
        ("Device.Types.Wide", Value::U16(65535)),
    ];
    for (name, expected) in cases {
        let got = consumer.get(name).expect("Failed to get");
        assert_eq!(got, expected, "{name} did not survive the wire");
    }
}

#[test]
fn test_sessions_lifecycle() {
    let bus = Bus::local();
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    assert_eq!(
        consumer.get_current_session().expect("Failed to query"),
        0,
        "No session at start"
    );
    let id = consumer.create_session().expect("Failed to create session");
    assert!(id > 0);
    assert_eq!(consumer.get_current_session().expect("Failed to query"), id);

    let err = consumer
        .create_session()
        .expect_err("Second session must be refused");
    assert_eq!(err, Error::SessionAlreadyExists);

    assert_eq!(
        consumer
            .close_session(id + 5)
            .expect_err("Wrong id must be refused"),
        Error::InvalidInput
    );
    assert_eq!(
        consumer.close_session(0).expect_err("Id zero is reserved"),
        Error::InvalidInput
    );

    consumer.close_session(id).expect("Failed to close session");
    assert_eq!(consumer.get_current_session().expect("Failed to query"), 0);

    // a fresh session is available again
    let next = consumer.create_session().expect("Failed to recreate");
    assert!(next > id);
    consumer.close_session(next).expect("Failed to close");
}

#[test]
fn test_discovery() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let owners = consumer
        .discover_component_name(&["Device.Sample.Model", "Device.Absent.X"])
        .expect("Failed to discover owners");
    assert_eq!(
        owners,
        vec![(
            "Device.Sample.Model".to_string(),
            "test.sample.provider".to_string()
        )]
    );

    let elements = consumer
        .discover_component_data_elements("test.sample.provider")
        .expect("Failed to list elements");
    assert_eq!(elements.len(), 9);
    assert!(elements.iter().any(|e| e == "Device.Sample.Model"));
    assert!(elements.iter().any(|e| e == "Device.Sample.Started!"));
}

#[test]
fn test_operations_after_close_fail() {
    let bus = Bus::local();
    let provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");
    consumer.close().expect("Failed to close");

    assert_eq!(
        consumer
            .get("Device.Sample.Model")
            .expect_err("Closed handle must refuse"),
        Error::InvalidHandle
    );
    assert_eq!(
        consumer.close().expect_err("Double close must fail"),
        Error::InvalidHandle
    );

    // the provider is unaffected
    let again = bus.open("test.consumer2").expect("Failed to reopen");
    assert_eq!(
        again
            .get_string("Device.Sample.Model")
            .expect("Failed to get"),
        "X-2000"
    );
    drop(provider);
}

#[test]
fn test_unregister_withdraws_elements() {
    let bus = Bus::local();
    let provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    provider
        .handle
        .unregister_data_elements(&[DataElement::property(
            "Device.Sample.Serial",
            PropertyHandlers::default(),
        )])
        .expect("Failed to unregister");

    let err = consumer
        .get("Device.Sample.Serial")
        .expect_err("Withdrawn element must be gone");
    assert_eq!(err, Error::ElementDoesNotExist);

    // the rest of the subtree still answers
    assert_eq!(
        consumer
            .get_string("Device.Sample.Model")
            .expect("Failed to get"),
        "X-2000"
    );
}

#[test]
fn test_registration_conflict_rolls_back() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let other = bus.open("test.rival.provider").expect("Failed to open");

    // the second element collides with test.sample.provider's advertisement
    let err = other
        .register_data_elements(&[
            DataElement::property(
                "Device.Rival.Ok",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::Bool(true))),
            ),
            DataElement::property(
                "Device.Sample.Model",
                PropertyHandlers::read_only(|_, _, _| Ok(Value::Bool(true))),
            ),
        ])
        .expect_err("Cross-component name conflict must fail");
    assert_eq!(err, Error::Bus);

    // nothing from the failed batch survives
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");
    let err = consumer
        .get("Device.Rival.Ok")
        .expect_err("Rolled-back element must not answer");
    assert_eq!(err, Error::Bus);
}

#[test]
fn test_concurrent_reads_share_one_handle() {
    let bus = Bus::local();
    let _provider = open_sample_provider(&bus);
    let consumer = bus.open("test.consumer").expect("Failed to open consumer");

    let barrier = Arc::new(Barrier::new(8));
    let mut workers = Vec::new();

    for _ in 0..8 {
        let consumer = consumer.clone();
        let barrier = Arc::clone(&barrier);
        workers.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..250 {
                match fastrand::usize(..4) {
                    0 => {
                        let v = consumer
                            .get("Device.Sample.Serial")
                            .expect("Failed to get Serial");
                        assert_eq!(v.as_str(), Some("SN-001"));
                    }
                    1 => {
                        let v = consumer
                            .get_u32("Device.Sample.Uptime")
                            .expect("Failed to get Uptime");
                        assert_eq!(v, 42);
                    }
                    2 => {
                        let v = consumer
                            .get("Device.Sample.Cranky")
                            .expect("Failed to get Cranky");
                        assert_eq!(v.as_bool(), Some(false));
                    }
                    _ => {
                        let props = consumer
                            .get_multiple(&["Device.Sample.Model", "Device.Sample.Serial"])
                            .expect("Failed to get batch");
                        assert_eq!(props.len(), 2);
                    }
                }
            }
        }));
    }

    for worker in workers {
        worker.join().expect("reader thread should succeed");
    }
}
