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

//! Config value wrappers that can be read either literally or from the
//! environment, using the `$VAR_NAME` syntax.

use std::borrow::Cow;

/// A custom type to support `PrivateKey` deserialization from environment variables.
pub mod private_key;
/// A custom type to support `RpcUrl` deserialization from environment variables.
pub mod rpc_url;

/// Resolves a config value that may reference an environment variable.
///
/// Values starting with `$` are looked up in the environment, anything else
/// is returned as is.
pub(crate) fn resolve_env_value(value: &str) -> Result<Cow<'_, str>, String> {
    match value.strip_prefix('$') {
        Some(var) => {
            tracing::trace!("Reading {} from env", var);
            std::env::var(var).map(Cow::Owned).map_err(|e| {
                format!("error while loading this env {var}: {e}")
            })
        }
        None => Ok(Cow::Borrowed(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_values_are_borrowed() {
        let v = resolve_env_value("https://rpc.example").unwrap();
        assert!(matches!(v, Cow::Borrowed("https://rpc.example")));
    }

    #[test]
    fn env_values_are_resolved() {
        std::env::set_var("RESOLVE_ENV_TEST_VALUE", "wss://ws.example");
        let v = resolve_env_value("$RESOLVE_ENV_TEST_VALUE").unwrap();
        assert_eq!(v, "wss://ws.example");
    }

    #[test]
    fn missing_env_is_an_error() {
        let err = resolve_env_value("$AURACLE_TEST_SURELY_UNSET").unwrap_err();
        assert!(err.contains("AURACLE_TEST_SURELY_UNSET"));
    }
}
