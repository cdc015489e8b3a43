// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Once;

use hub_power::{DescriptorSink, HostStack, Millis, TransferError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub at: Millis,
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

/// Host stack double. Tests set `ready` and `now` between ticks, queue up
/// what port 1 should answer, and read back what got sent.
pub struct MockHost {
    pub ready: bool,
    pub now: Millis,
    /// Answers for successive port 1 requests. Empty means `Ok`.
    pub port1: VecDeque<Result<(), TransferError>>,
    /// Answer for every request to ports 2-4.
    pub others: Result<(), TransferError>,
    /// Delivered to the sink on the next `task`, then forgotten.
    pub descriptors: Vec<Vec<u8>>,
    pub began: bool,
    pub tasks: usize,
    pub sent: Vec<Submission>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            ready: false,
            now: 0,
            port1: VecDeque::new(),
            others: Ok(()),
            descriptors: Vec::new(),
            began: false,
            tasks: 0,
            sent: Vec::new(),
        }
    }

    pub fn ports(&self) -> Vec<u16> {
        self.sent.iter().map(|s| s.index).collect()
    }
}

impl HostStack for MockHost {
    fn begin(&mut self) {
        self.began = true;
    }

    fn task(&mut self, sink: &mut dyn DescriptorSink) {
        self.tasks += 1;
        for d in self.descriptors.drain(..) {
            let ty = d.get(1).copied().unwrap_or(0);
            sink.on_config_descriptor(ty, &d);
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn submit_control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<(), TransferError> {
        self.sent.push(Submission {
            at: self.now,
            request_type,
            request,
            value,
            index,
            length,
        });
        if index == 1 {
            self.port1.pop_front().unwrap_or(Ok(()))
        } else {
            self.others
        }
    }
}

thread_local! {
    static LINES: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// Keeps every log line, per test thread, so tests can see what the firmware
/// would have printed on its console.
struct LineRecorder;

impl log::Log for LineRecorder {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!("{}", record.args());
        LINES.with(|lines| lines.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

static RECORDER: LineRecorder = LineRecorder;
static INSTALL: Once = Once::new();

/// Runs `f` and returns the log lines it produced on this thread.
pub fn log_lines<F: FnOnce()>(f: F) -> Vec<String> {
    INSTALL.call_once(|| {
        log::set_logger(&RECORDER).expect("no other logger in tests");
        log::set_max_level(log::LevelFilter::Trace);
    });
    LINES.with(|lines| lines.borrow_mut().clear());
    f();
    LINES.with(|lines| lines.borrow_mut().split_off(0))
}

/// How many of `lines` contain `needle`.
pub fn count(lines: &[String], needle: &str) -> usize {
    lines.iter().filter(|l| l.contains(needle)).count()
}
