// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::Result;
use crate::scheduler::TimerEvent;

/// Identifies one outbound backend call. Only the newest handle is current;
/// completions carrying any other handle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub(crate) u64);

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Messages delivered to the control loop by background tasks.
#[derive(Debug)]
pub enum LoopEvent {
    Timer(TimerEvent),
    Response {
        handle: RequestHandle,
        result: Result<String>,
    },
}
