// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! What ends up on the serial console. For the classifier that's the only
//! thing it does, so these check the lines themselves.

mod util;

use hub_power::classifier::Classifier;
use hub_power::{App, ControllerConfig, DescriptorSink, PortPowerController, TickOutcome};
use pretty_assertions::assert_eq;

use util::{count, log_lines, MockHost};

fn interface(class: u8) -> [u8; 9] {
    [0x09, 0x04, 0x00, 0x00, 0x01, class, 0x00, 0x00, 0x00]
}

fn feed(ty: u8, data: &[u8]) -> Vec<String> {
    log_lines(|| Classifier::new().on_config_descriptor(ty, data))
}

#[test]
fn hub_interface_says_hub_once() {
    let lines = feed(0x04, &interface(0x09));
    assert_eq!(
        lines,
        vec![
            "INTF: class=0x09 sub=0x00 proto=0x00".to_string(),
            ">>> hub detected <<<".to_string(),
        ]
    );
}

#[test]
fn mass_storage_interface_says_mass_storage_once() {
    let lines = feed(0x04, &interface(0x08));
    assert_eq!(count(&lines, "INTF: class=0x08"), 1);
    assert_eq!(count(&lines, "mass storage device detected"), 1);
    assert_eq!(count(&lines, "hub detected"), 0);
}

#[test]
fn other_classes_only_print_the_interface() {
    for class in [0x00, 0x03, 0x07, 0x0a, 0x0e, 0xff] {
        let lines = feed(0x04, &interface(class));
        assert_eq!(lines.len(), 1, "class {:#04x}: {:?}", class, lines);
        assert!(lines[0].starts_with("INTF: class="));
        assert_eq!(count(&lines, "detected"), 0);
    }
}

#[test]
fn truncated_interface_is_reported_not_classified() {
    let lines = feed(0x04, &interface(0x09)[..3]);
    assert_eq!(
        lines,
        vec!["skipping interface descriptor: descriptor truncated: need 9 bytes, have 3".to_string()]
    );
}

#[test]
fn other_descriptor_types_are_silent() {
    for ty in [0x01, 0x02, 0x05, 0x29] {
        assert!(feed(ty, &interface(0x09)).is_empty());
    }
}

#[test]
fn app_reports_the_hub_then_powers_it() {
    let mut host = MockHost::new();
    host.descriptors = vec![
        vec![0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0xe0, 0x32],
        interface(0x09).to_vec(),
        vec![0x07, 0x05, 0x81, 0x03, 0x01, 0x00, 0xff],
    ];
    let mut app = App::new(host, ControllerConfig::default());

    let enumeration = log_lines(|| {
        assert_eq!(app.tick(1000), TickOutcome::Throttled);
    });
    assert_eq!(count(&enumeration, "hub detected"), 1);
    assert_eq!(count(&enumeration, "mass storage"), 0);

    app.host_mut().ready = true;
    let powering = log_lines(|| {
        assert_eq!(app.tick(2500), TickOutcome::Powered);
        assert_eq!(app.tick(5000), TickOutcome::Done);
    });
    assert_eq!(count(&powering, "port 1 power on command sent"), 1);
    assert_eq!(count(&powering, "hub detected"), 0);
}

#[test]
fn waiting_line_follows_the_window() {
    let mut host = MockHost::new();
    let mut ctl = PortPowerController::new(ControllerConfig::default());

    // Attempts land at 2002, 4004, ..., 18018. Only those within the first
    // 100 ms of a 4 s period print: 4004, 8008, 12012, 16016.
    let lines = log_lines(|| {
        for now in (0..20_000).step_by(7) {
            host.now = now;
            ctl.tick(&mut host, now);
        }
    });
    assert_eq!(count(&lines, "waiting for hub to be ready"), 4);
    assert_eq!(lines.len(), 4);
    assert!(host.sent.is_empty());
}
