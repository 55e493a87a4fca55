// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "auracle_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the node changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// A full registry snapshot was loaded or failed.
    #[display(fmt = "snapshot")]
    Snapshot,
    /// A single sensor record was patched from a `DataSubmitted` event.
    #[display(fmt = "patch")]
    Patch,
    /// A state changing transaction (register, submit, set base uri).
    #[display(fmt = "write")]
    Write,
    /// A token metadata request was served.
    #[display(fmt = "metadata")]
    Metadata,
    /// The websocket event subscription changed state.
    #[display(fmt = "subscription")]
    Subscription,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_display_snake_case() {
        assert_eq!(Kind::Lifecycle.to_string(), "lifecycle");
        assert_eq!(Kind::Subscription.to_string(), "subscription");
    }
}
